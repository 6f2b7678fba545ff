// src/services/market_data.rs
//! Fetch-and-align operations behind each dashboard section.
//!
//! Every function here takes its provider as a trait object, so the render
//! pass can run against the real HTTP clients and the tests against fakes.

use chrono::{Datelike, Duration, NaiveDate};
use futures_util::future::join_all;
use log::{error, info, warn};
use std::collections::{BTreeSet, HashMap};

use crate::models::{
    DateTable, EarningsEvent, EconomicRelease, FedFuturesPoint, IndexPriceSeries, IndexPrices,
    Observation, SeriesColumn, YieldSeries, CreditSpreadSeries,
};
use crate::services::provider::{
    EarningsCalendarProvider, EconomicDataProvider, ProviderError, ProviderResult, QuoteProvider,
    QuoteRange, ReleaseCalendarProvider,
};

/// Tenor label → FRED series id, in declaration (short to long) order.
pub const YIELD_TENORS: &[(&str, &str)] = &[
    ("US1M", "DGS1MO"),
    ("US3M", "DTB3"),
    ("US6M", "DGS6MO"),
    ("US1Y", "DGS1"),
    ("US2Y", "DGS2"),
    ("US5Y", "DGS5"),
    ("US10Y", "DGS10"),
    ("US20Y", "DGS20"),
    ("US30Y", "DGS30"),
];

/// ICE BofA option-adjusted spread indices, in percentage points.
pub const CREDIT_SPREAD_SERIES: &[(&str, &str)] = &[
    ("High Yield", "BAMLH0A0HYM2"),
    ("BBB", "BAMLC0A4CBBB"),
    ("AAA", "BAMLC0A1CAAA"),
];

pub const DEFAULT_CREDIT_LOOKBACK: usize = 1500;

/// Release names that count as high-impact.
pub const IMPORTANT_KEYWORDS: &[&str] = &[
    "Consumer Price Index",
    "Employment Situation",
    "Gross Domestic Product",
    "Personal Income and Outlays",
    "Producer Price Index",
    "Retail Sales",
    "Retail and Food Services",
    "FOMC",
    "Unemployment Insurance Weekly Claims",
    "Job Openings and Labor Turnover",
    "Industrial Production",
    "New Residential Construction",
    "Durable Goods",
    "Consumer Sentiment",
];

pub const EARNINGS_MARKET_CAP_FLOOR: f64 = 10_000_000_000.0;
pub const EARNINGS_WINDOW_DAYS: i64 = 7;

/// Effective federal funds rate, daily.
pub const FED_FUNDS_RATE_SERIES: &str = "DFF";
pub const FED_FUTURES_CONTRACTS: usize = 12;
const BASIS_POINTS_PER_CUT: f64 = 0.25;

/// (ticker, display label) in display order.
pub const INDEX_WATCHLIST: &[(&str, &str)] = &[
    ("^GSPC", "S&P 500"),
    ("^NDX", "Nasdaq 100"),
    ("^DJI", "Dow Jones"),
    ("^RUT", "Russell 2000"),
    ("^VIX", "VIX"),
    ("^TNX", "10Y Yield"),
    ("DX-Y.NYB", "US Dollar Index"),
    ("GC=F", "Gold"),
    ("CL=F", "WTI Crude"),
    ("BTC-USD", "Bitcoin"),
];

/// Keeps the trailing `lookback` observations of each column, aligns them on
/// the union of their dates and forward-fills gaps. Leading gaps stay `None`.
pub fn align_forward_filled(columns: Vec<(String, Vec<Observation>)>, lookback: usize) -> DateTable {
    let trimmed: Vec<(String, Vec<Observation>)> = columns
        .into_iter()
        .map(|(name, mut obs)| {
            obs.sort_by_key(|o| o.date);
            let skip = obs.len().saturating_sub(lookback);
            (name, obs.split_off(skip))
        })
        .collect();

    let dates: Vec<NaiveDate> = trimmed
        .iter()
        .flat_map(|(_, obs)| obs.iter().map(|o| o.date))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let columns = trimmed
        .into_iter()
        .map(|(name, obs)| {
            let by_date: HashMap<NaiveDate, Option<f64>> =
                obs.iter().map(|o| (o.date, o.value)).collect();
            let mut last = None;
            let values = dates
                .iter()
                .map(|d| {
                    if let Some(v) = by_date.get(d).copied().flatten() {
                        last = Some(v);
                    }
                    last
                })
                .collect();
            SeriesColumn { name, values }
        })
        .collect();

    DateTable { dates, columns }
}

async fn fetch_aligned(
    provider: &dyn EconomicDataProvider,
    series: &[(&str, &str)],
    lookback: usize,
) -> ProviderResult<DateTable> {
    let fetched = join_all(series.iter().map(|(_, id)| provider.fetch_series(id))).await;

    let mut columns = Vec::with_capacity(series.len());
    for ((name, id), result) in series.iter().zip(fetched) {
        match result {
            Ok(obs) => columns.push((name.to_string(), obs)),
            Err(e) => {
                error!("Failed to fetch series {} ({}): {}", id, name, e);
                return Err(e);
            }
        }
    }
    Ok(align_forward_filled(columns, lookback))
}

pub async fn fetch_yield_series(
    provider: &dyn EconomicDataProvider,
    lookback_days: usize,
) -> ProviderResult<YieldSeries> {
    info!("Fetching Treasury yields, lookback {}", lookback_days);
    fetch_aligned(provider, YIELD_TENORS, lookback_days).await
}

pub async fn fetch_credit_spreads(
    provider: &dyn EconomicDataProvider,
    lookback_days: usize,
) -> ProviderResult<CreditSpreadSeries> {
    info!("Fetching credit spreads, lookback {}", lookback_days);
    fetch_aligned(provider, CREDIT_SPREAD_SERIES, lookback_days).await
}

/// Case-insensitive substring match against any keyword.
pub fn is_important(name: &str, keywords: &[&str]) -> bool {
    let name = name.to_lowercase();
    keywords.iter().any(|k| name.contains(&k.to_lowercase()))
}

pub fn filter_important(releases: Vec<EconomicRelease>, keywords: &[&str]) -> Vec<EconomicRelease> {
    releases
        .into_iter()
        .filter(|r| is_important(&r.release_name, keywords))
        .collect()
}

/// Releases dated within `[start, end]`, oldest first.
pub async fn fetch_release_window(
    provider: &dyn ReleaseCalendarProvider,
    start: NaiveDate,
    end: NaiveDate,
    only_important: bool,
) -> ProviderResult<Vec<EconomicRelease>> {
    let mut releases: Vec<EconomicRelease> = provider
        .fetch_calendar_window(start, end)
        .await?
        .into_iter()
        .filter(|r| r.date >= start && r.date <= end)
        .collect();

    if only_important {
        releases = filter_important(releases, IMPORTANT_KEYWORDS);
    }
    releases.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.release_name.cmp(&b.release_name))
    });
    releases.dedup_by(|a, b| a.date == b.date && a.release_id == b.release_id);
    Ok(releases)
}

/// Releases from today through `today + days_ahead`. Errors are logged and
/// yield an empty list.
pub async fn fetch_upcoming_releases(
    provider: &dyn ReleaseCalendarProvider,
    today: NaiveDate,
    days_ahead: i64,
    only_important: bool,
) -> Vec<EconomicRelease> {
    let end = today + Duration::days(days_ahead.max(0));
    match fetch_release_window(provider, today, end, only_important).await {
        Ok(releases) => releases,
        Err(e) => {
            error!("Failed to fetch upcoming releases: {}", e);
            Vec::new()
        }
    }
}

/// Releases from the past `days_back` days, most recent first.
pub async fn fetch_recent_releases(
    provider: &dyn ReleaseCalendarProvider,
    today: NaiveDate,
    days_back: i64,
    only_important: bool,
) -> Vec<EconomicRelease> {
    let start = today - Duration::days(days_back.max(0));
    match fetch_release_window(provider, start, today, only_important).await {
        Ok(mut releases) => {
            releases.reverse();
            releases
        }
        Err(e) => {
            error!("Failed to fetch recent releases: {}", e);
            Vec::new()
        }
    }
}

pub async fn fetch_earnings_dates(
    provider: &dyn EarningsCalendarProvider,
    today: NaiveDate,
) -> ProviderResult<Vec<EarningsEvent>> {
    let end = today + Duration::days(EARNINGS_WINDOW_DAYS - 1);
    let mut events: Vec<EarningsEvent> = provider
        .fetch_earnings_window(EARNINGS_MARKET_CAP_FLOOR, today, end)
        .await?
        .into_iter()
        .filter(|e| e.earnings_date >= today && e.earnings_date <= end)
        .collect();

    events.sort_by(|a, b| {
        a.earnings_date
            .cmp(&b.earnings_date)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    Ok(events)
}

const FUTURES_MONTH_CODES: [char; 12] = ['F', 'G', 'H', 'J', 'K', 'M', 'N', 'Q', 'U', 'V', 'X', 'Z'];

/// First day of `count` consecutive months starting with the month of `today`.
pub fn contract_months(today: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let (mut year, mut month) = (today.year(), today.month());
    let mut months = Vec::with_capacity(count);
    for _ in 0..count {
        if let Some(d) = NaiveDate::from_ymd_opt(year, month, 1) {
            months.push(d);
        }
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    months
}

/// CBOT 30-day Fed funds futures symbol on Yahoo, e.g. `ZQZ24.CBT`.
pub fn fed_futures_ticker(contract_month: NaiveDate) -> String {
    let code = FUTURES_MONTH_CODES[contract_month.month0() as usize];
    format!("ZQ{}{:02}.CBT", code, contract_month.year() % 100)
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Implied rate is `100 - price`; cuts are counted in 25bp steps below the
/// current effective rate (negative values mean hikes).
pub fn derive_fed_futures_point(
    contract_month: NaiveDate,
    price: f64,
    current_rate: f64,
) -> FedFuturesPoint {
    let implied_rate = round_to(100.0 - price, 4);
    FedFuturesPoint {
        contract_month,
        implied_rate,
        cuts_priced_in: round_to((current_rate - implied_rate) / BASIS_POINTS_PER_CUT, 2),
    }
}

pub async fn fetch_fed_futures_curve(
    quotes: &dyn QuoteProvider,
    economic: &dyn EconomicDataProvider,
    today: NaiveDate,
) -> ProviderResult<Vec<FedFuturesPoint>> {
    let current_rate = economic
        .fetch_series(FED_FUNDS_RATE_SERIES)
        .await?
        .into_iter()
        .rev()
        .find_map(|o| o.value)
        .ok_or_else(|| ProviderError::NoData(FED_FUNDS_RATE_SERIES.to_string()))?;
    info!("Effective fed funds rate: {}", current_rate);

    let months = contract_months(today, FED_FUTURES_CONTRACTS);
    let tickers: Vec<String> = months.iter().map(|m| fed_futures_ticker(*m)).collect();
    let prices = quotes.fetch_quotes(&tickers, QuoteRange::FiveDays).await?;

    let mut points = Vec::with_capacity(months.len());
    for (month, ticker) in months.iter().zip(&tickers) {
        match prices.get(ticker).and_then(|bars| bars.last()) {
            Some(bar) => points.push(derive_fed_futures_point(*month, bar.close, current_rate)),
            None => warn!("No quote for fed funds contract {}", ticker),
        }
    }
    Ok(points)
}

/// One-year daily bars for the watchlist. `None` when nothing came back.
pub async fn fetch_index_prices(quotes: &dyn QuoteProvider) -> Option<IndexPrices> {
    let tickers: Vec<String> = INDEX_WATCHLIST.iter().map(|(t, _)| t.to_string()).collect();
    let mut downloaded = match quotes.fetch_quotes(&tickers, QuoteRange::OneYear).await {
        Ok(map) => map,
        Err(e) => {
            error!("Index price download failed: {}", e);
            return None;
        }
    };

    let series: Vec<IndexPriceSeries> = INDEX_WATCHLIST
        .iter()
        .filter_map(|(ticker, label)| {
            downloaded.remove(*ticker).map(|mut bars| {
                bars.sort_by_key(|b| b.date);
                IndexPriceSeries {
                    ticker: ticker.to_string(),
                    label: label.to_string(),
                    bars,
                }
            })
        })
        .collect();

    if series.is_empty() {
        warn!("Index price download returned no tickers");
        return None;
    }
    Some(IndexPrices { series })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OhlcBar;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::Mutex;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n)
    }

    fn obs(n: i64, v: Option<f64>) -> Observation {
        Observation { date: day(n), value: v }
    }

    struct FakeSeries(HashMap<String, Vec<Observation>>);

    #[async_trait]
    impl EconomicDataProvider for FakeSeries {
        async fn fetch_series(&self, series_id: &str) -> ProviderResult<Vec<Observation>> {
            self.0
                .get(series_id)
                .cloned()
                .ok_or_else(|| ProviderError::NoData(series_id.to_string()))
        }
    }

    struct FakeCalendar {
        releases: Vec<EconomicRelease>,
        fail: bool,
        requested: Mutex<Vec<(NaiveDate, NaiveDate)>>,
    }

    #[async_trait]
    impl ReleaseCalendarProvider for FakeCalendar {
        async fn fetch_calendar_window(
            &self,
            start: NaiveDate,
            end: NaiveDate,
        ) -> ProviderResult<Vec<EconomicRelease>> {
            self.requested.lock().unwrap().push((start, end));
            if self.fail {
                return Err(ProviderError::Http("503 Service Unavailable".into()));
            }
            Ok(self.releases.clone())
        }
    }

    struct FakeQuotes(HashMap<String, Vec<OhlcBar>>);

    #[async_trait]
    impl QuoteProvider for FakeQuotes {
        async fn fetch_quotes(
            &self,
            tickers: &[String],
            _range: QuoteRange,
        ) -> ProviderResult<HashMap<String, Vec<OhlcBar>>> {
            let out: HashMap<_, _> = tickers
                .iter()
                .filter_map(|t| self.0.get(t).map(|b| (t.clone(), b.clone())))
                .collect();
            if out.is_empty() {
                return Err(ProviderError::Http("connection refused".into()));
            }
            Ok(out)
        }
    }

    fn bar(n: i64, close: f64) -> OhlcBar {
        OhlcBar { date: day(n), open: close, high: close, low: close, close }
    }

    fn release(name: &str, n: i64, id: u32) -> EconomicRelease {
        EconomicRelease { date: day(n), release_name: name.to_string(), release_id: id }
    }

    #[test]
    fn align_forward_fills_but_keeps_leading_gaps() {
        let table = align_forward_filled(
            vec![
                ("A".into(), vec![obs(0, Some(1.0)), obs(1, None), obs(3, Some(3.0))]),
                ("B".into(), vec![obs(2, Some(5.0)), obs(3, Some(6.0))]),
            ],
            10,
        );

        assert_eq!(table.dates, vec![day(0), day(1), day(2), day(3)]);
        assert_eq!(table.columns[0].values, vec![Some(1.0), Some(1.0), Some(1.0), Some(3.0)]);
        assert_eq!(table.columns[1].values, vec![None, None, Some(5.0), Some(6.0)]);
    }

    #[test]
    fn align_keeps_only_trailing_lookback() {
        let table = align_forward_filled(
            vec![("A".into(), (0..10).map(|n| obs(n, Some(n as f64))).collect())],
            3,
        );
        assert_eq!(table.dates, vec![day(7), day(8), day(9)]);
        assert_eq!(table.columns[0].values, vec![Some(7.0), Some(8.0), Some(9.0)]);
    }

    #[tokio::test]
    async fn yields_keep_tenor_order() {
        let data = YIELD_TENORS
            .iter()
            .enumerate()
            .map(|(i, (_, id))| (id.to_string(), vec![obs(0, Some(i as f64))]))
            .collect();
        let table = fetch_yield_series(&FakeSeries(data), 360).await.unwrap();

        let names: Vec<&str> = table.column_names().collect();
        let expected: Vec<&str> = YIELD_TENORS.iter().map(|(t, _)| *t).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn one_failing_series_fails_the_table() {
        let mut data = HashMap::new();
        data.insert("BAMLH0A0HYM2".to_string(), vec![obs(0, Some(3.1))]);
        let err = fetch_credit_spreads(&FakeSeries(data), DEFAULT_CREDIT_LOOKBACK)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NoData(_)));
    }

    #[test]
    fn importance_is_case_insensitive() {
        assert!(is_important("CONSUMER PRICE INDEX", IMPORTANT_KEYWORDS));
        assert!(is_important("Advance Monthly Sales for Retail and Food Services", IMPORTANT_KEYWORDS));
        assert!(!is_important("Minor Regional Index", IMPORTANT_KEYWORDS));
    }

    #[tokio::test]
    async fn only_important_keeps_cpi() {
        let calendar = FakeCalendar {
            releases: vec![
                release("Minor Regional Index", 1, 2),
                release("Consumer Price Index", 0, 10),
            ],
            fail: false,
            requested: Mutex::new(Vec::new()),
        };
        let out = fetch_upcoming_releases(&calendar, day(0), 14, true).await;

        assert_eq!(out, vec![release("Consumer Price Index", 0, 10)]);
        assert_eq!(calendar.requested.lock().unwrap()[0], (day(0), day(14)));
    }

    #[tokio::test]
    async fn releases_sorted_and_windowed() {
        let calendar = FakeCalendar {
            releases: vec![
                release("Producer Price Index", 5, 46),
                release("Gross Domestic Product", -3, 53),
                release("Employment Situation", 2, 50),
                release("Employment Situation", 2, 50),
            ],
            fail: false,
            requested: Mutex::new(Vec::new()),
        };
        let out = fetch_upcoming_releases(&calendar, day(0), 7, false).await;
        let names: Vec<&str> = out.iter().map(|r| r.release_name.as_str()).collect();
        assert_eq!(names, vec!["Employment Situation", "Producer Price Index"]);
    }

    #[tokio::test]
    async fn release_errors_become_empty() {
        let calendar = FakeCalendar {
            releases: vec![release("Consumer Price Index", 0, 10)],
            fail: true,
            requested: Mutex::new(Vec::new()),
        };
        assert!(fetch_upcoming_releases(&calendar, day(0), 14, true).await.is_empty());
        assert!(fetch_recent_releases(&calendar, day(0), 7, true).await.is_empty());
    }

    #[tokio::test]
    async fn recent_releases_newest_first() {
        let calendar = FakeCalendar {
            releases: vec![
                release("Consumer Price Index", -5, 10),
                release("Employment Situation", -1, 50),
            ],
            fail: false,
            requested: Mutex::new(Vec::new()),
        };
        let out = fetch_recent_releases(&calendar, day(0), 7, true).await;
        assert_eq!(out[0].release_name, "Employment Situation");
        assert_eq!(out[1].release_name, "Consumer Price Index");
    }

    #[test]
    fn contract_months_roll_over_year() {
        let months = contract_months(NaiveDate::from_ymd_opt(2024, 11, 20).unwrap(), 3);
        assert_eq!(
            months,
            vec![
                NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            ]
        );
        assert_eq!(fed_futures_ticker(months[1]), "ZQZ24.CBT");
        assert_eq!(fed_futures_ticker(months[2]), "ZQF25.CBT");
    }

    #[test]
    fn futures_price_to_implied_rate_and_cuts() {
        let point = derive_fed_futures_point(day(0), 95.17, 5.33);
        assert_eq!(point.implied_rate, 4.83);
        assert_eq!(point.cuts_priced_in, 2.0);
    }

    #[tokio::test]
    async fn fed_futures_skip_missing_contracts() {
        let today = NaiveDate::from_ymd_opt(2024, 11, 20).unwrap();
        let mut series = HashMap::new();
        series.insert(
            FED_FUNDS_RATE_SERIES.to_string(),
            vec![obs(0, Some(4.83)), obs(1, None)],
        );
        let mut quotes = HashMap::new();
        quotes.insert("ZQX24.CBT".to_string(), vec![bar(0, 95.3), bar(1, 95.42)]);
        quotes.insert("ZQF25.CBT".to_string(), vec![bar(1, 95.67)]);

        let curve = fetch_fed_futures_curve(&FakeQuotes(quotes), &FakeSeries(series), today)
            .await
            .unwrap();

        assert_eq!(curve.len(), 2);
        assert_eq!(curve[0].implied_rate, 4.58);
        assert_eq!(curve[0].cuts_priced_in, 1.0);
        assert_eq!(curve[1].contract_month, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[tokio::test]
    async fn index_prices_follow_watchlist_order() {
        let mut quotes = HashMap::new();
        quotes.insert("GC=F".to_string(), vec![bar(1, 2300.0), bar(0, 2290.0)]);
        quotes.insert("^GSPC".to_string(), vec![bar(0, 5000.0)]);

        let prices = fetch_index_prices(&FakeQuotes(quotes)).await.unwrap();
        let tickers: Vec<&str> = prices.series.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["^GSPC", "GC=F"]);
        assert!(prices.series[1].bars[0].date < prices.series[1].bars[1].date);
    }

    #[tokio::test]
    async fn index_prices_none_on_total_failure() {
        assert!(fetch_index_prices(&FakeQuotes(HashMap::new())).await.is_none());
    }

    fn arb_column() -> impl Strategy<Value = Vec<(i64, Option<f64>)>> {
        prop::collection::vec((0i64..60, prop::option::of(0.0..10.0f64)), 0..40)
    }

    proptest! {
        #[test]
        fn aligned_index_sorted_and_gaps_filled(
            a in arb_column(),
            b in arb_column(),
            lookback in 1usize..50,
        ) {
            let to_obs = |v: Vec<(i64, Option<f64>)>| {
                let mut seen = BTreeSet::new();
                v.into_iter()
                    .filter(|(d, _)| seen.insert(*d))
                    .map(|(d, val)| obs(d, val))
                    .collect::<Vec<_>>()
            };
            let table = align_forward_filled(
                vec![("A".into(), to_obs(a)), ("B".into(), to_obs(b))],
                lookback,
            );

            prop_assert!(table.dates.windows(2).all(|w| w[0] <= w[1]));
            for col in &table.columns {
                prop_assert_eq!(col.values.len(), table.dates.len());
                let mut seen_value = false;
                for v in &col.values {
                    if v.is_some() {
                        seen_value = true;
                    } else {
                        prop_assert!(!seen_value, "gap after an earlier value in {}", col.name);
                    }
                }
            }
        }

        #[test]
        fn important_filter_is_idempotent(names in prop::collection::vec(
            prop::sample::select(vec![
                "Consumer Price Index",
                "Minor Regional Index",
                "employment situation",
                "H.8 Assets and Liabilities",
                "Producer Price Index",
            ]),
            0..12,
        )) {
            let releases: Vec<EconomicRelease> = names
                .iter()
                .enumerate()
                .map(|(i, n)| release(n, i as i64, i as u32))
                .collect();
            let once = filter_important(releases, IMPORTANT_KEYWORDS);
            let twice = filter_important(once.clone(), IMPORTANT_KEYWORDS);
            prop_assert_eq!(once, twice);
        }
    }
}
