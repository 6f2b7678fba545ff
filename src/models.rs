// src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single dated value from the economic-data provider. `None` marks a
/// missing observation (FRED reports these as ".").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Date-indexed table of named numeric columns. Every column has exactly
/// `dates.len()` values and `dates` is sorted ascending without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateTable {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<SeriesColumn>,
}

impl DateTable {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Values of every column at row `idx`, in column order.
    pub fn row(&self, idx: usize) -> Vec<Option<f64>> {
        self.columns
            .iter()
            .map(|c| c.values.get(idx).copied().flatten())
            .collect()
    }
}

/// Tenor label → yields in percent.
pub type YieldSeries = DateTable;

/// Rating bucket → option-adjusted spread.
pub type CreditSpreadSeries = DateTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomicRelease {
    pub date: NaiveDate,
    pub release_name: String,
    pub release_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsEvent {
    pub symbol: String,
    pub company: String,
    pub event_name: String,
    pub earnings_date: NaiveDate,
    pub eps_estimate: Option<f64>,
    pub reported_eps: Option<f64>,
    pub surprise_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FedFuturesPoint {
    /// First day of the contract's delivery month.
    pub contract_month: NaiveDate,
    pub implied_rate: f64,
    pub cuts_priced_in: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexPriceSeries {
    pub ticker: String,
    pub label: String,
    pub bars: Vec<OhlcBar>,
}

/// Watchlist prices in watchlist order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexPrices {
    pub series: Vec<IndexPriceSeries>,
}
