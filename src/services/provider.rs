// src/services/provider.rs
//! Narrow interfaces over the external data providers.
//!
//! The data access layer only talks to these traits, so every fetch path can
//! be exercised in tests with in-memory fakes.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{EarningsEvent, EconomicRelease, Observation, OhlcBar};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no API key configured for {provider}")]
    MissingApiKey { provider: &'static str },

    #[error("{provider} rejected the API key: {message}")]
    Unauthorized { provider: &'static str, message: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected response format: {0}")]
    Decode(String),

    #[error("no data returned for {0}")]
    NoData(String),
}

impl ProviderError {
    /// Missing or rejected credentials, as opposed to a transport failure.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ProviderError::MissingApiKey { .. } | ProviderError::Unauthorized { .. }
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Http(e.to_string())
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Query-by-series-id economic data (FRED).
#[async_trait]
pub trait EconomicDataProvider: Send + Sync {
    /// Full history for one series, oldest first.
    async fn fetch_series(&self, series_id: &str) -> ProviderResult<Vec<Observation>>;
}

/// Economic release calendar (FRED release dates).
#[async_trait]
pub trait ReleaseCalendarProvider: Send + Sync {
    async fn fetch_calendar_window(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<EconomicRelease>>;
}

/// Requested history for a quotes download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteRange {
    FiveDays,
    OneYear,
}

impl QuoteRange {
    pub fn as_param(self) -> &'static str {
        match self {
            QuoteRange::FiveDays => "5d",
            QuoteRange::OneYear => "1y",
        }
    }
}

/// Batch OHLC downloads (Yahoo Finance).
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Daily bars per ticker. Tickers that could not be fetched are absent
    /// from the map; an error means nothing at all came back.
    async fn fetch_quotes(
        &self,
        tickers: &[String],
        range: QuoteRange,
    ) -> ProviderResult<HashMap<String, Vec<OhlcBar>>>;
}

/// Upcoming earnings for companies at or above a market-cap floor (USD).
#[async_trait]
pub trait EarningsCalendarProvider: Send + Sync {
    async fn fetch_earnings_window(
        &self,
        min_market_cap: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<EarningsEvent>>;
}
