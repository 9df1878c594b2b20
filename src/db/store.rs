//! Durable time-series store interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::StoreError;
use crate::models::{Candle, ForecastPoint, Symbol};

/// Record kind, also the table name on QuestDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measurement {
    Ohlcv,
    Prediction,
}

impl Measurement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Measurement::Ohlcv => "ohlcv",
            Measurement::Prediction => "prediction",
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writes are upserts keyed by (measurement, symbol, timestamp): writing an
/// existing key replaces the row. Range bounds are inclusive.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Newest candle for `symbol` at or after `since`.
    async fn query_last(
        &self,
        symbol: &Symbol,
        since: DateTime<Utc>,
    ) -> Result<Option<Candle>, StoreError>;

    async fn query_candles(
        &self,
        symbol: &Symbol,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Vec<Candle>, StoreError>;

    /// Returns the number of rows written.
    async fn write_candles(&self, symbol: &Symbol, candles: &[Candle]) -> Result<usize, StoreError>;

    async fn write_forecast(
        &self,
        symbol: &Symbol,
        points: &[ForecastPoint],
        generated_at: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    /// Whether the backend currently holds a usable connection.
    async fn is_connected(&self) -> bool {
        true
    }
}
