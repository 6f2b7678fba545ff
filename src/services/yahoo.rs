// src/services/yahoo.rs
//! Yahoo Finance v8 chart API. Yahoo has no official API, so the response
//! shape is checked defensively and any mismatch is a decode error.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use futures_util::future::join_all;
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use crate::models::OhlcBar;
use crate::services::provider::{ProviderError, ProviderResult, QuoteProvider, QuoteRange};

const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Clone)]
pub struct YahooClient {
    client: Client,
}

impl YahooClient {
    pub fn new(client: Client) -> Self {
        YahooClient { client }
    }

    async fn fetch_one(&self, ticker: &str, range: QuoteRange) -> ProviderResult<Vec<OhlcBar>> {
        let url = format!("{}/{}", CHART_URL, ticker);
        let resp = self
            .client
            .get(&url)
            .query(&[("range", range.as_param()), ("interval", "1d")])
            .send()
            .await?
            .error_for_status()?
            .json::<ChartResponse>()
            .await?;
        parse_chart(ticker, resp)
    }
}

fn parse_chart(ticker: &str, resp: ChartResponse) -> ProviderResult<Vec<OhlcBar>> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => ProviderError::NoData(ticker.to_string()),
        Some(err) => ProviderError::Decode(format!("{}: {}", err.code, err.description)),
        None => ProviderError::Decode("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Decode("result array is empty".into()))?;
    let timestamps = data
        .timestamp
        .ok_or_else(|| ProviderError::NoData(ticker.to_string()))?;
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Decode("no quote data".into()))?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date: NaiveDate = DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| ProviderError::Decode(format!("invalid timestamp: {}", ts)))?;

        let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        // Holidays and halted sessions come back as all-null rows
        if let (Some(open), Some(high), Some(low), Some(close)) = (
            field(&quote.open),
            field(&quote.high),
            field(&quote.low),
            field(&quote.close),
        ) {
            bars.push(OhlcBar {
                date,
                open,
                high,
                low,
                close,
            });
        }
    }

    if bars.is_empty() {
        return Err(ProviderError::NoData(ticker.to_string()));
    }
    Ok(bars)
}

#[async_trait]
impl QuoteProvider for YahooClient {
    async fn fetch_quotes(
        &self,
        tickers: &[String],
        range: QuoteRange,
    ) -> ProviderResult<HashMap<String, Vec<OhlcBar>>> {
        info!("Downloading {} tickers from Yahoo ({})", tickers.len(), range.as_param());

        let results = join_all(tickers.iter().map(|t| self.fetch_one(t, range))).await;

        let mut out = HashMap::new();
        let mut last_error = None;
        for (ticker, result) in tickers.iter().zip(results) {
            match result {
                Ok(bars) => {
                    out.insert(ticker.clone(), bars);
                }
                Err(e) => {
                    warn!("Yahoo download failed for {}: {}", ticker, e);
                    last_error = Some(e);
                }
            }
        }

        match (out.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_rows_are_skipped() {
        let body = r#"{"chart":{"result":[{
            "timestamp":[1714570200,1714656600,1714743000],
            "indicators":{"quote":[{
                "open":[5029.0,null,5084.6],
                "high":[5096.1,null,5139.1],
                "low":[5013.4,null,5084.6],
                "close":[5018.3,null,5127.7],
                "volume":[1,null,3]
            }]}
        }],"error":null}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        let bars = parse_chart("^GSPC", resp).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 5018.3);
        assert_eq!(bars[1].open, 5084.6);
        assert!(bars[0].date < bars[1].date);
    }

    #[test]
    fn unknown_symbol_is_no_data() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        let err = parse_chart("ZZZZ", resp).unwrap_err();
        assert!(matches!(err, ProviderError::NoData(_)));
    }
}
