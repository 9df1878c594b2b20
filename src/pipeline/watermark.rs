use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::TimeSeriesStore;
use crate::models::Symbol;

/// Resume point per symbol, always recomputed from the store.
pub struct WatermarkResolver {
    store: Arc<dyn TimeSeriesStore>,
    lookback: Duration,
}

impl WatermarkResolver {
    pub fn new(store: Arc<dyn TimeSeriesStore>, lookback: Duration) -> Self {
        Self { store, lookback }
    }

    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.lookback
    }

    /// Timestamp of the newest candle inside the lookback window.
    ///
    /// A failed query resolves to `None`: that only widens the next fetch.
    pub async fn resolve(&self, symbol: &Symbol, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.store.query_last(symbol, self.window_start(now)).await {
            Ok(last) => {
                let watermark = last.map(|c| c.timestamp);
                debug!(symbol = %symbol, watermark = ?watermark, "Resolved watermark");
                watermark
            }
            Err(e) => {
                warn!(
                    symbol = %symbol,
                    error = %e,
                    "Watermark query failed, falling back to the lookback window"
                );
                None
            }
        }
    }

    /// Where the next fetch starts. The watermark itself is re-fetched so a
    /// candle that was still open at the last pass gets its final values.
    pub fn fetch_start(&self, watermark: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
        watermark.unwrap_or_else(|| self.window_start(now))
    }
}
