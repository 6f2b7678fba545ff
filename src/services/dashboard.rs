// src/services/dashboard.rs
//! One render pass over every dashboard section.
//!
//! Each section is fetched, transformed and charted on its own; a failing
//! provider turns only its section into a [`Section::Failed`].

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use chrono_tz::US::Eastern;
use log::{debug, error, info, warn};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::models::{
    CreditSpreadSeries, DateTable, EarningsEvent, EconomicRelease, FedFuturesPoint, IndexPrices,
    YieldSeries,
};
use crate::services::charts::{self, Figure};
use crate::services::fred::FredClient;
use crate::services::market_data;
use crate::services::nasdaq::NasdaqClient;
use crate::services::provider::{
    EarningsCalendarProvider, EconomicDataProvider, ProviderError, ProviderResult, QuoteProvider,
    ReleaseCalendarProvider,
};
use crate::services::session::{Controls, DashboardContext};
use crate::services::transform::{self, YieldCurveSnapshot};
use crate::services::yahoo::YahooClient;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
pub const RECENT_RELEASE_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ProviderFetch,
    ProviderAuth,
}

/// Outcome of one dashboard section. `Empty` is informational, not a failure.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Ready { data: T },
    Empty { message: String },
    Failed { kind: FailureKind, message: String },
}

pub trait SectionData {
    fn has_content(&self) -> bool;
}

impl<T> SectionData for Vec<T> {
    fn has_content(&self) -> bool {
        !self.is_empty()
    }
}

impl SectionData for DateTable {
    fn has_content(&self) -> bool {
        !self.is_empty()
    }
}

impl SectionData for IndexPrices {
    fn has_content(&self) -> bool {
        !self.series.is_empty()
    }
}

impl<T: SectionData> SectionData for Arc<T> {
    fn has_content(&self) -> bool {
        self.as_ref().has_content()
    }
}

impl<T> Section<T> {
    pub fn empty(what: &str) -> Self {
        warn!("{}: provider returned no data", what);
        Section::Empty {
            message: format!("No {} data available right now.", what),
        }
    }

    pub fn failed(what: &str, err: &ProviderError) -> Self {
        error!("{}: {}", what, err);
        if err.is_auth() {
            Section::Failed {
                kind: FailureKind::ProviderAuth,
                message: format!("{} unavailable: {}. Check FRED_API_KEY.", what, err),
            }
        } else {
            Section::Failed {
                kind: FailureKind::ProviderFetch,
                message: format!("Could not load {}: {}", what, err),
            }
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Section<U> {
        match self {
            Section::Ready { data } => Section::Ready { data: f(data) },
            Section::Empty { message } => Section::Empty { message },
            Section::Failed { kind, message } => Section::Failed { kind, message },
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Section::Ready { data } => Some(data),
            _ => None,
        }
    }
}

impl<T: SectionData> Section<T> {
    pub fn from_result(what: &str, result: ProviderResult<T>) -> Self {
        match result {
            Ok(data) if data.has_content() => Section::Ready { data },
            Ok(_) => Section::empty(what),
            Err(e) => Section::failed(what, &e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RatesPanel {
    pub time_series: Figure,
    pub curve: Option<Figure>,
    pub snapshot: Option<YieldCurveSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FuturesPanel {
    pub figure: Figure,
    pub points: Vec<FedFuturesPoint>,
}

/// Everything the page needs for one authenticated render.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub as_of: NaiveDate,
    pub controls: Controls,
    pub rates: Section<RatesPanel>,
    pub credit: Section<Figure>,
    pub fed_futures: Section<FuturesPanel>,
    pub markets: Section<Figure>,
    pub upcoming_releases: Section<Vec<EconomicRelease>>,
    pub earnings: Section<Vec<EarningsEvent>>,
    pub recent_releases: Vec<EconomicRelease>,
}

/// The provider set behind the dashboard.
#[derive(Clone)]
pub struct Dashboard {
    economic: Arc<dyn EconomicDataProvider>,
    calendar: Arc<dyn ReleaseCalendarProvider>,
    quotes: Arc<dyn QuoteProvider>,
    earnings: Arc<dyn EarningsCalendarProvider>,
    calendar_key_configured: bool,
}

impl Dashboard {
    pub fn new(
        economic: Arc<dyn EconomicDataProvider>,
        calendar: Arc<dyn ReleaseCalendarProvider>,
        quotes: Arc<dyn QuoteProvider>,
        earnings: Arc<dyn EarningsCalendarProvider>,
        calendar_key_configured: bool,
    ) -> Self {
        Dashboard {
            economic,
            calendar,
            quotes,
            earnings,
            calendar_key_configured,
        }
    }

    /// Wires the real HTTP clients sharing one bounded-timeout client.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        let fred = Arc::new(FredClient::new(client.clone(), config.fred_api_key.clone()));
        let has_key = fred.has_api_key();
        Ok(Dashboard::new(
            fred.clone(),
            fred,
            Arc::new(YahooClient::new(client.clone())),
            Arc::new(NasdaqClient::new(client)),
            has_key,
        ))
    }

    /// Calendar date in New York, where the release and earnings calendars live.
    pub fn today() -> NaiveDate {
        Utc::now().with_timezone(&Eastern).date_naive()
    }

    /// Yield table for `lookback_days`, served from the session's cache while
    /// fresh. The context is not held during the download; a session that
    /// logged out meanwhile gets the table but nothing is cached for it.
    pub async fn yields(
        &self,
        ctx: &Mutex<DashboardContext>,
        token: &str,
        lookback_days: usize,
    ) -> ProviderResult<Arc<YieldSeries>> {
        let cached = ctx
            .lock()
            .await
            .session(token)
            .and_then(|s| s.yield_cache.get(&lookback_days));
        if let Some(hit) = cached {
            debug!("yield cache hit for lookback {}", lookback_days);
            return Ok(hit);
        }
        debug!("yield cache miss for lookback {}", lookback_days);

        let series = Arc::new(market_data::fetch_yield_series(self.economic.as_ref(), lookback_days).await?);
        if let Some(session) = ctx.lock().await.session_mut(token) {
            session.yield_cache.insert(lookback_days, series.clone());
        }
        Ok(series)
    }

    pub async fn credit_spreads_bps(&self) -> ProviderResult<CreditSpreadSeries> {
        let raw = market_data::fetch_credit_spreads(
            self.economic.as_ref(),
            market_data::DEFAULT_CREDIT_LOOKBACK,
        )
        .await?;
        Ok(transform::convert_spreads_to_bps(&raw))
    }

    pub async fn upcoming_releases(
        &self,
        today: NaiveDate,
        days_ahead: i64,
        only_important: bool,
    ) -> Section<Vec<EconomicRelease>> {
        if !self.calendar_key_configured {
            return Section::failed(
                "economic calendar",
                &ProviderError::MissingApiKey { provider: "FRED" },
            );
        }
        let releases =
            market_data::fetch_upcoming_releases(self.calendar.as_ref(), today, days_ahead, only_important)
                .await;
        Section::from_result("economic calendar", Ok(releases))
    }

    pub async fn recent_releases(&self, today: NaiveDate, only_important: bool) -> Vec<EconomicRelease> {
        if !self.calendar_key_configured {
            return Vec::new();
        }
        market_data::fetch_recent_releases(
            self.calendar.as_ref(),
            today,
            RECENT_RELEASE_DAYS,
            only_important,
        )
        .await
    }

    pub async fn earnings(&self, today: NaiveDate) -> Section<Vec<EarningsEvent>> {
        Section::from_result(
            "earnings calendar",
            market_data::fetch_earnings_dates(self.earnings.as_ref(), today).await,
        )
    }

    pub async fn fed_futures(&self, today: NaiveDate) -> Section<Vec<FedFuturesPoint>> {
        Section::from_result(
            "fed funds futures",
            market_data::fetch_fed_futures_curve(self.quotes.as_ref(), self.economic.as_ref(), today)
                .await,
        )
    }

    pub async fn index_prices(&self) -> Section<IndexPrices> {
        match market_data::fetch_index_prices(self.quotes.as_ref()).await {
            Some(prices) => Section::Ready { data: prices },
            None => Section::empty("index price"),
        }
    }

    async fn rates_panel(
        &self,
        ctx: &Mutex<DashboardContext>,
        token: &str,
        lookback_days: usize,
    ) -> Section<RatesPanel> {
        Section::from_result("treasury yield", self.yields(ctx, token, lookback_days).await).map(|series| {
            let snapshot = transform::build_yield_curve_snapshot(&series);
            RatesPanel {
                time_series: charts::yield_time_series_figure(&series),
                curve: snapshot.as_ref().map(charts::yield_curve_figure),
                snapshot,
            }
        })
    }

    async fn credit_panel(&self) -> Section<Figure> {
        Section::from_result("credit spread", self.credit_spreads_bps().await)
            .map(|bps| charts::credit_spread_figure(&bps))
    }

    async fn futures_panel(&self, today: NaiveDate) -> Section<FuturesPanel> {
        self.fed_futures(today).await.map(|points| FuturesPanel {
            figure: charts::fed_futures_figure(&points),
            points,
        })
    }

    async fn markets_panel(&self) -> Section<Figure> {
        self.index_prices()
            .await
            .map(|prices| charts::index_candlestick_figure(&prices))
    }

    /// Renders every section for the session behind `token` when it is
    /// authenticated; `None` otherwise.
    pub async fn render(
        &self,
        ctx: &Mutex<DashboardContext>,
        token: &str,
        today: NaiveDate,
    ) -> Option<DashboardView> {
        let controls = ctx
            .lock()
            .await
            .session(token)
            .filter(|s| s.is_authenticated())
            .map(|s| s.controls)?;
        info!("Rendering dashboard for {} with {:?}", today, controls);

        let (rates, credit, fed_futures, markets, upcoming_releases, earnings, recent_releases) = tokio::join!(
            self.rates_panel(ctx, token, controls.lookback_days),
            self.credit_panel(),
            self.futures_panel(today),
            self.markets_panel(),
            self.upcoming_releases(today, controls.days_ahead, controls.only_important),
            self.earnings(today),
            self.recent_releases(today, controls.only_important),
        );

        Some(DashboardView {
            as_of: today,
            controls,
            rates,
            credit,
            fed_futures,
            markets,
            upcoming_releases,
            earnings,
            recent_releases,
        })
    }
}
