use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bucket. Identified in the store by (symbol, timestamp).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Merge `newer` into `base` keyed by timestamp; `newer` wins on collisions.
/// The result is sorted oldest first.
pub fn merge_candles(base: Vec<Candle>, newer: &[Candle]) -> Vec<Candle> {
    let mut merged: std::collections::BTreeMap<DateTime<Utc>, Candle> =
        base.into_iter().map(|c| (c.timestamp, c)).collect();
    for candle in newer {
        merged.insert(candle.timestamp, *candle);
    }
    merged.into_values().collect()
}
