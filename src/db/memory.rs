//! Process-local store with the same upsert semantics as QuestDB's
//! `DEDUP UPSERT KEYS(timestamp, symbol)` tables.
//!
//! Failures can be injected per symbol and per measurement, or for every
//! call at once by dropping the simulated connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::db::store::{Measurement, TimeSeriesStore};
use crate::error::StoreError;
use crate::models::{Candle, ForecastPoint, Symbol};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredPrediction {
    pub point: ForecastPoint,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Operation {
    Read,
    Write,
}

#[derive(Default)]
pub struct InMemoryStore {
    candles: RwLock<HashMap<Symbol, BTreeMap<DateTime<Utc>, Candle>>>,
    predictions: RwLock<HashMap<Symbol, BTreeMap<DateTime<Utc>, StoredPrediction>>>,
    failing: RwLock<HashSet<(Symbol, Measurement, Operation)>>,
    disconnected: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make reads of `measurement` for `symbol` fail until [`heal`](Self::heal).
    pub async fn fail_reads(&self, symbol: &Symbol, measurement: Measurement) {
        self.failing
            .write()
            .await
            .insert((symbol.clone(), measurement, Operation::Read));
    }

    /// Make writes of `measurement` for `symbol` fail until [`heal`](Self::heal).
    pub async fn fail_writes(&self, symbol: &Symbol, measurement: Measurement) {
        self.failing
            .write()
            .await
            .insert((symbol.clone(), measurement, Operation::Write));
    }

    pub async fn heal(&self, symbol: &Symbol) {
        self.failing.write().await.retain(|(s, _, _)| s != symbol);
    }

    /// Fail every call with a connection error until [`reconnect`](Self::reconnect).
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    pub fn reconnect(&self) {
        self.disconnected.store(false, Ordering::SeqCst);
    }

    /// All candles for `symbol`, oldest first.
    pub async fn candles(&self, symbol: &Symbol) -> Vec<Candle> {
        self.candles
            .read()
            .await
            .get(symbol)
            .map(|rows| rows.values().copied().collect())
            .unwrap_or_default()
    }

    /// All stored predictions for `symbol`, oldest target time first.
    pub async fn predictions(&self, symbol: &Symbol) -> Vec<StoredPrediction> {
        self.predictions
            .read()
            .await
            .get(symbol)
            .map(|rows| rows.values().copied().collect())
            .unwrap_or_default()
    }

    async fn check(
        &self,
        symbol: &Symbol,
        measurement: Measurement,
        operation: Operation,
    ) -> Result<(), StoreError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(StoreError::Connect("in-memory store disconnected".to_string()));
        }
        if self
            .failing
            .read()
            .await
            .contains(&(symbol.clone(), measurement, operation))
        {
            return Err(StoreError::Unavailable(format!(
                "injected {:?} failure on {} for {}",
                operation, measurement, symbol
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TimeSeriesStore for InMemoryStore {
    async fn query_last(
        &self,
        symbol: &Symbol,
        since: DateTime<Utc>,
    ) -> Result<Option<Candle>, StoreError> {
        self.check(symbol, Measurement::Ohlcv, Operation::Read).await?;
        let candles = self.candles.read().await;
        Ok(candles
            .get(symbol)
            .and_then(|rows| rows.range(since..).next_back())
            .map(|(_, c)| *c))
    }

    async fn query_candles(
        &self,
        symbol: &Symbol,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Vec<Candle>, StoreError> {
        self.check(symbol, Measurement::Ohlcv, Operation::Read).await?;
        if start > stop {
            return Ok(Vec::new());
        }
        let candles = self.candles.read().await;
        Ok(candles
            .get(symbol)
            .map(|rows| rows.range(start..=stop).map(|(_, c)| *c).collect())
            .unwrap_or_default())
    }

    async fn write_candles(&self, symbol: &Symbol, candles: &[Candle]) -> Result<usize, StoreError> {
        self.check(symbol, Measurement::Ohlcv, Operation::Write).await?;
        let mut all = self.candles.write().await;
        let rows = all.entry(symbol.clone()).or_default();
        for candle in candles {
            rows.insert(candle.timestamp, *candle);
        }
        Ok(candles.len())
    }

    async fn write_forecast(
        &self,
        symbol: &Symbol,
        points: &[ForecastPoint],
        generated_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.check(symbol, Measurement::Prediction, Operation::Write)
            .await?;
        let mut all = self.predictions.write().await;
        let rows = all.entry(symbol.clone()).or_default();
        for point in points {
            rows.insert(
                point.timestamp,
                StoredPrediction {
                    point: *point,
                    generated_at,
                },
            );
        }
        Ok(points.len())
    }

    async fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::SeqCst)
    }
}
