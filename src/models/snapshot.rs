//! Read-path export documents.
//!
//! Both documents are replaced wholesale each cycle. `updated_at` is the
//! render time; consumers should treat a document as valid only as of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candle::Candle;
use super::forecast::ForecastPoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub symbol: String,
    pub updated_at: DateTime<Utc>,
    pub count: usize,
    pub data: Vec<Candle>,
}

impl HistorySnapshot {
    /// Candles stamped after `updated_at` are dropped so the document never
    /// claims data newer than its own generation time.
    pub fn new(symbol: String, updated_at: DateTime<Utc>, mut data: Vec<Candle>) -> Self {
        data.retain(|c| c.timestamp <= updated_at);
        data.sort_by_key(|c| c.timestamp);
        Self {
            symbol,
            updated_at,
            count: data.len(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSnapshot {
    pub symbol: String,
    pub updated_at: DateTime<Utc>,
    pub count: usize,
    pub forecast: Vec<ForecastPoint>,
}

impl ForecastSnapshot {
    pub fn new(symbol: String, updated_at: DateTime<Utc>, forecast: Vec<ForecastPoint>) -> Self {
        Self {
            symbol,
            updated_at,
            count: forecast.len(),
            forecast,
        }
    }
}
