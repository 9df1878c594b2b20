//! Market data source interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SourceError;
use crate::models::{Candle, Symbol, Timeframe};

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Candles for `symbol` at or after `since`, oldest first, at most `limit`.
    ///
    /// An empty result means nothing new and is not an error.
    async fn fetch_candles(
        &self,
        symbol: &Symbol,
        timeframe: &Timeframe,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError>;
}

/// Sort oldest first, keep the last occurrence of each timestamp, drop
/// anything before `since` and cap the result at `limit` candles.
pub fn normalize_candles(
    candles: Vec<Candle>,
    since: Option<DateTime<Utc>>,
    limit: usize,
) -> Vec<Candle> {
    let mut by_time = std::collections::BTreeMap::new();
    for candle in candles {
        if since.map_or(true, |s| candle.timestamp >= s) {
            by_time.insert(candle.timestamp, candle);
        }
    }
    by_time.into_values().take(limit).collect()
}
