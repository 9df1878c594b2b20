//! QuestDB store for candles and predictions over the PostgreSQL wire protocol

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info, warn};

use crate::db::connection::{ConnectionSlot, Connector};
use crate::db::store::TimeSeriesStore;
use crate::error::StoreError;
use crate::models::{Candle, ForecastPoint, Symbol};

// WAL tables with upsert keys give (symbol, timestamp) overwrite semantics.
const CREATE_OHLCV: &str = "CREATE TABLE IF NOT EXISTS ohlcv (
        timestamp TIMESTAMP,
        symbol SYMBOL,
        open DOUBLE,
        high DOUBLE,
        low DOUBLE,
        close DOUBLE,
        volume DOUBLE
    ) TIMESTAMP(timestamp) PARTITION BY DAY WAL
    DEDUP UPSERT KEYS(timestamp, symbol)";

const CREATE_PREDICTION: &str = "CREATE TABLE IF NOT EXISTS prediction (
        timestamp TIMESTAMP,
        symbol SYMBOL,
        yhat DOUBLE,
        yhat_lower DOUBLE,
        yhat_upper DOUBLE,
        generated_at TIMESTAMP
    ) TIMESTAMP(timestamp) PARTITION BY DAY WAL
    DEDUP UPSERT KEYS(timestamp, symbol)";

const INSERT_CANDLE: &str = "INSERT INTO ohlcv (timestamp, symbol, open, high, low, close, volume)
     VALUES ($1, $2, $3, $4, $5, $6, $7)";

const INSERT_PREDICTION: &str =
    "INSERT INTO prediction (timestamp, symbol, yhat, yhat_lower, yhat_upper, generated_at)
     VALUES ($1, $2, $3, $4, $5, $6)";

const SELECT_LAST_CANDLE: &str = "SELECT timestamp, open, high, low, close, volume
     FROM ohlcv
     WHERE symbol = $1 AND timestamp >= $2
     ORDER BY timestamp DESC
     LIMIT 1";

const SELECT_CANDLE_RANGE: &str = "SELECT timestamp, open, high, low, close, volume
     FROM ohlcv
     WHERE symbol = $1 AND timestamp >= $2 AND timestamp <= $3
     ORDER BY timestamp ASC";

/// Reconnect attempts made inside a cycle, after the first one.
const RECONNECT_RETRIES: usize = 1;

/// Opens a PG-wire session and makes sure both tables exist.
struct PgConnector {
    url: String,
    timeout: Duration,
}

#[async_trait]
impl Connector for PgConnector {
    type Connection = Client;

    async fn connect(&self) -> Result<Client, StoreError> {
        let (client, connection) =
            match tokio::time::timeout(self.timeout, tokio_postgres::connect(&self.url, NoTls)).await {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => return Err(StoreError::Connect(e.to_string())),
                Err(_) => return Err(StoreError::Timeout(self.timeout)),
            };

        tokio::spawn(async move {
            match connection.await {
                Ok(()) => info!("QuestDB connection closed"),
                Err(e) => error!(error = %e, "QuestDB connection error"),
            }
        });

        bounded(self.timeout, client.execute(CREATE_OHLCV, &[])).await?;
        bounded(self.timeout, client.execute(CREATE_PREDICTION, &[])).await?;
        info!("QuestDB schema ready (ohlcv, prediction)");
        Ok(client)
    }

    fn is_closed(&self, client: &Client) -> bool {
        client.is_closed()
    }
}

/// QuestDB-backed [`TimeSeriesStore`]. A dropped session is replaced on the
/// next call, so an outage costs the cycles it overlaps and no more.
pub struct QuestDatabase {
    slot: ConnectionSlot<PgConnector>,
    timeout: Duration,
}

impl QuestDatabase {
    /// Connect once and make sure both tables exist. Every call, including
    /// this one, is bounded by `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        Self::connect_with_retry(url, timeout, 0).await
    }

    /// [`connect`](Self::connect) with exponential backoff, for startup.
    pub async fn connect_with_retry(
        url: &str,
        timeout: Duration,
        max_attempts: usize,
    ) -> Result<Self, StoreError> {
        let connector = PgConnector {
            url: url.to_string(),
            timeout,
        };
        let db = Self {
            slot: ConnectionSlot::new(connector, RECONNECT_RETRIES),
            timeout,
        };
        db.slot.establish(max_attempts).await?;
        Ok(db)
    }

    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>, StoreError> {
        let client = self.slot.get().await?;
        let result = bounded(self.timeout, client.query(sql, params)).await;
        self.observe(&client, result).await
    }

    /// Drop the session after a connection-level failure.
    async fn observe<T>(&self, client: &Arc<Client>, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if let Err(e) = &result {
            if e.is_connection_loss() {
                warn!(error = %e, "QuestDB session unusable, reconnecting on next call");
                self.slot.invalidate(client).await;
            }
        }
        result
    }
}

async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, tokio_postgres::Error>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

fn utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(naive, Utc)
}

fn column<'a, T>(row: &'a Row, idx: usize, name: &str) -> Result<T, StoreError>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get(idx)
        .map_err(|e| StoreError::Malformed(format!("column {}: {}", name, e)))
}

fn candle_from_row(row: &Row) -> Result<Candle, StoreError> {
    let timestamp: NaiveDateTime = column(row, 0, "timestamp")?;
    Ok(Candle::new(
        column(row, 1, "open")?,
        column(row, 2, "high")?,
        column(row, 3, "low")?,
        column(row, 4, "close")?,
        column(row, 5, "volume")?,
        utc(timestamp),
    ))
}

#[async_trait]
impl TimeSeriesStore for QuestDatabase {
    async fn query_last(
        &self,
        symbol: &Symbol,
        since: DateTime<Utc>,
    ) -> Result<Option<Candle>, StoreError> {
        let symbol = symbol.to_string();
        let since = since.naive_utc();
        let rows = self.query(SELECT_LAST_CANDLE, &[&symbol, &since]).await?;
        rows.first().map(candle_from_row).transpose()
    }

    async fn query_candles(
        &self,
        symbol: &Symbol,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Vec<Candle>, StoreError> {
        let symbol = symbol.to_string();
        let (start, stop) = (start.naive_utc(), stop.naive_utc());
        let rows = self.query(SELECT_CANDLE_RANGE, &[&symbol, &start, &stop]).await?;
        rows.iter().map(candle_from_row).collect()
    }

    async fn write_candles(&self, symbol: &Symbol, candles: &[Candle]) -> Result<usize, StoreError> {
        if candles.is_empty() {
            return Ok(0);
        }
        let symbol_tag = symbol.to_string();
        let client = self.slot.get().await?;
        let statement = self
            .observe(&client, bounded(self.timeout, client.prepare(INSERT_CANDLE)).await)
            .await?;

        // Each row is its own key, so a failure part-way leaves earlier rows intact.
        for candle in candles {
            let timestamp = candle.timestamp.naive_utc();
            let params: [&(dyn ToSql + Sync); 7] = [
                &timestamp,
                &symbol_tag,
                &candle.open,
                &candle.high,
                &candle.low,
                &candle.close,
                &candle.volume,
            ];
            self.observe(&client, bounded(self.timeout, client.execute(&statement, &params)).await)
                .await?;
        }

        debug!(symbol = %symbol, count = candles.len(), "QuestDB: upserted {} candles", candles.len());
        Ok(candles.len())
    }

    async fn write_forecast(
        &self,
        symbol: &Symbol,
        points: &[ForecastPoint],
        generated_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        if points.is_empty() {
            return Ok(0);
        }
        let symbol_tag = symbol.to_string();
        let generated_at = generated_at.naive_utc();
        let client = self.slot.get().await?;
        let statement = self
            .observe(&client, bounded(self.timeout, client.prepare(INSERT_PREDICTION)).await)
            .await?;

        for point in points {
            let timestamp = point.timestamp.naive_utc();
            let params: [&(dyn ToSql + Sync); 6] = [
                &timestamp,
                &symbol_tag,
                &point.yhat,
                &point.yhat_lower,
                &point.yhat_upper,
                &generated_at,
            ];
            self.observe(&client, bounded(self.timeout, client.execute(&statement, &params)).await)
                .await?;
        }

        debug!(symbol = %symbol, count = points.len(), "QuestDB: upserted {} forecast points", points.len());
        Ok(points.len())
    }

    async fn is_connected(&self) -> bool {
        self.slot.is_connected().await
    }
}
