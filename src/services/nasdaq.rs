// src/services/nasdaq.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::future::join_all;
use log::{info, warn};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::models::EarningsEvent;
use crate::services::provider::{EarningsCalendarProvider, ProviderError, ProviderResult};

const EARNINGS_URL: &str = "https://api.nasdaq.com/api/calendar/earnings";

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    data: Option<CalendarData>,
}

#[derive(Debug, Deserialize)]
struct CalendarData {
    rows: Option<Vec<EarningsRow>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarningsRow {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    market_cap: Option<String>,
    #[serde(default)]
    fiscal_quarter_ending: Option<String>,
    #[serde(default)]
    eps_forecast: Option<String>,
    #[serde(default)]
    eps: Option<String>,
    #[serde(default)]
    surprise: Option<String>,
}

/// Nasdaq's public earnings calendar; one request per calendar day.
#[derive(Clone)]
pub struct NasdaqClient {
    client: Client,
}

impl NasdaqClient {
    pub fn new(client: Client) -> Self {
        NasdaqClient { client }
    }

    async fn fetch_day(&self, date: NaiveDate) -> ProviderResult<Vec<EarningsRow>> {
        let resp = self
            .client
            .get(EARNINGS_URL)
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json::<CalendarResponse>()
            .await?;
        // Weekends and holidays come back with null rows
        Ok(resp.data.and_then(|d| d.rows).unwrap_or_default())
    }
}

fn money_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\()?-?\$?([0-9][0-9,]*(?:\.[0-9]+)?)\)?%?$").expect("valid money regex")
    })
}

/// Parses cells like `$1,234.50`, `($0.12)`, `-3.5` or `12%`. Blank and
/// `N/A` cells are `None`.
fn parse_amount(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    let caps = money_pattern().captures(cell)?;
    let magnitude: f64 = caps.get(2)?.as_str().replace(',', "").parse().ok()?;
    let negative = caps.get(1).is_some() || cell.starts_with('-');
    Some(if negative { -magnitude } else { magnitude })
}

fn to_event(row: EarningsRow, date: NaiveDate) -> EarningsEvent {
    let event_name = match row.fiscal_quarter_ending.as_deref().map(str::trim) {
        Some(quarter) if !quarter.is_empty() => format!("Earnings for quarter ending {}", quarter),
        _ => "Earnings release".to_string(),
    };
    EarningsEvent {
        symbol: row.symbol,
        company: row.name.unwrap_or_default(),
        event_name,
        earnings_date: date,
        eps_estimate: row.eps_forecast.as_deref().and_then(parse_amount),
        reported_eps: row.eps.as_deref().and_then(parse_amount),
        surprise_pct: row.surprise.as_deref().and_then(parse_amount),
    }
}

#[async_trait]
impl EarningsCalendarProvider for NasdaqClient {
    async fn fetch_earnings_window(
        &self,
        min_market_cap: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<EarningsEvent>> {
        info!("Fetching Nasdaq earnings calendar {} .. {}", start, end);

        let days: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= end).collect();
        let results = join_all(days.iter().map(|d| self.fetch_day(*d))).await;

        let mut events = Vec::new();
        let mut failures = 0;
        let mut last_error = None;
        for (date, result) in days.iter().zip(results) {
            match result {
                Ok(rows) => events.extend(
                    rows.into_iter()
                        .filter(|r| {
                            r.market_cap.as_deref().and_then(parse_amount).unwrap_or(0.0)
                                >= min_market_cap
                        })
                        .map(|r| to_event(r, *date)),
                ),
                Err(e) => {
                    warn!("Nasdaq earnings fetch failed for {}: {}", date, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if failures == days.len() {
            return Err(last_error
                .unwrap_or_else(|| ProviderError::NoData("empty earnings window".to_string())));
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_are_parsed() {
        assert_eq!(parse_amount("$3,020,245,856,530"), Some(3_020_245_856_530.0));
        assert_eq!(parse_amount("$1.60"), Some(1.6));
        assert_eq!(parse_amount("($0.12)"), Some(-0.12));
        assert_eq!(parse_amount("-3.5"), Some(-3.5));
        assert_eq!(parse_amount("12%"), Some(12.0));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("N/A"), None);
    }

    #[test]
    fn rows_become_events() {
        let body = r#"{"data":{"asOf":"Thu, May 2, 2024","rows":[{
            "lastYearRptDt":"5/04/2023","lastYearEPS":"$1.52","time":"time-after-hours",
            "symbol":"AAPL","name":"Apple Inc.","marketCap":"$2,628,578,196,240",
            "fiscalQuarterEnding":"Mar/2024","epsForecast":"$1.51","noOfEsts":"10"
        }]},"message":null}"#;
        let resp: CalendarResponse = serde_json::from_str(body).unwrap();
        let row = resp.data.unwrap().rows.unwrap().into_iter().next().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let event = to_event(row, date);

        assert_eq!(event.symbol, "AAPL");
        assert_eq!(event.event_name, "Earnings for quarter ending Mar/2024");
        assert_eq!(event.eps_estimate, Some(1.51));
        assert_eq!(event.reported_eps, None);
        assert_eq!(event.earnings_date, date);
    }

    #[test]
    fn null_cells_do_not_sink_the_day() {
        let body = r#"{"data":{"rows":[
            {"symbol":"XYZ","name":null,"marketCap":null,"fiscalQuarterEnding":null,"epsForecast":null},
            {"symbol":"MSFT","name":"Microsoft Corp.","marketCap":"$3,020,245,856,530",
             "fiscalQuarterEnding":"Mar/2024","epsForecast":"$2.82"}
        ]}}"#;
        let resp: CalendarResponse = serde_json::from_str(body).unwrap();
        let rows = resp.data.unwrap().rows.unwrap();
        assert_eq!(rows.len(), 2);

        let date = NaiveDate::from_ymd_opt(2024, 4, 25).unwrap();
        let mut rows = rows.into_iter();
        let sparse = to_event(rows.next().unwrap(), date);
        assert_eq!(sparse.event_name, "Earnings release");
        assert_eq!(sparse.company, "");
        assert_eq!(sparse.eps_estimate, None);
        assert_eq!(to_event(rows.next().unwrap(), date).eps_estimate, Some(2.82));
    }

    #[test]
    fn weekend_has_no_rows() {
        let body = r#"{"data":{"asOf":"Sat, May 4, 2024","rows":null},"message":null}"#;
        let resp: CalendarResponse = serde_json::from_str(body).unwrap();
        assert!(resp.data.and_then(|d| d.rows).is_none());
    }
}
