use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::error::SourceError;
use crate::models::{Candle, Symbol, Timeframe};
use crate::services::market_data::{normalize_candles, MarketDataSource};

/// Pulls one page of candles starting at a resume point.
///
/// A long outage is caught up one page per cycle; the watermark advances
/// with each page.
pub struct IncrementalFetcher {
    source: Arc<dyn MarketDataSource>,
    timeframe: Timeframe,
    page_size: usize,
}

impl IncrementalFetcher {
    pub fn new(source: Arc<dyn MarketDataSource>, timeframe: Timeframe, page_size: usize) -> Self {
        Self {
            source,
            timeframe,
            page_size,
        }
    }

    pub async fn fetch(&self, symbol: &Symbol, start: DateTime<Utc>) -> Result<Vec<Candle>, SourceError> {
        let raw = self
            .source
            .fetch_candles(symbol, &self.timeframe, Some(start), self.page_size)
            .await?;
        let received = raw.len();
        let candles = normalize_candles(raw, Some(start), self.page_size);

        debug!(
            symbol = %symbol,
            start = %start,
            received,
            kept = candles.len(),
            "Fetched {} candles for {}",
            candles.len(),
            symbol
        );
        Ok(candles)
    }
}
