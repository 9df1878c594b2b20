use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::TimeSeriesStore;
use crate::error::StoreError;
use crate::models::{Candle, ForecastPoint, Symbol};

/// Upserts candles and forecast points keyed by (symbol, timestamp, kind).
///
/// Every record is its own key, so a failure leaves already written records
/// untouched and re-running the same input converges to the same state.
pub struct StoreWriter {
    store: Arc<dyn TimeSeriesStore>,
}

impl StoreWriter {
    pub fn new(store: Arc<dyn TimeSeriesStore>) -> Self {
        Self { store }
    }

    pub async fn write_candles(&self, symbol: &Symbol, candles: &[Candle]) -> Result<usize, StoreError> {
        if candles.is_empty() {
            return Ok(0);
        }
        self.store.write_candles(symbol, candles).await
    }

    pub async fn write_forecast(
        &self,
        symbol: &Symbol,
        points: &[ForecastPoint],
        generated_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        if points.is_empty() {
            return Ok(0);
        }
        self.store.write_forecast(symbol, points, generated_at).await
    }
}
