//! Kline REST client for Binance-compatible exchanges

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::SourceError;
use crate::models::{Candle, Symbol, Timeframe};
use crate::services::market_data::{normalize_candles, MarketDataSource};

const KLINES_PATH: &str = "/api/v3/klines";

pub struct BinanceMarketData {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl BinanceMarketData {
    /// Every request is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("candlecast-worker")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout(self.timeout)
        } else {
            SourceError::Http(err)
        }
    }
}

#[async_trait]
impl MarketDataSource for BinanceMarketData {
    async fn fetch_candles(
        &self,
        symbol: &Symbol,
        timeframe: &Timeframe,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        let mut params = vec![
            ("symbol", symbol.exchange_pair()),
            ("interval", timeframe.as_str().to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(since) = since {
            params.push(("startTime", since.timestamp_millis().to_string()));
        }

        let url = format!("{}{}", self.base_url, KLINES_PATH);
        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            return Err(SourceError::RateLimited(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<Vec<Value>> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(self.timeout)
            } else {
                SourceError::Decode(e.to_string())
            }
        })?;

        let candles = rows
            .iter()
            .map(|row| decode_kline(row))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            symbol = %symbol,
            rows = candles.len(),
            "BinanceMarketData: received {} klines for {}",
            candles.len(),
            symbol
        );

        Ok(normalize_candles(candles, since, limit))
    }
}

/// `[open_time_ms, "open", "high", "low", "close", "volume", close_time_ms, ...]`
pub fn decode_kline(row: &[Value]) -> Result<Candle, SourceError> {
    if row.len() < 6 {
        return Err(SourceError::Decode(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }
    let open_time = row[0]
        .as_i64()
        .ok_or_else(|| SourceError::Decode("kline open time is not an integer".to_string()))?;
    let timestamp = DateTime::from_timestamp_millis(open_time)
        .ok_or_else(|| SourceError::Decode(format!("kline open time {} out of range", open_time)))?;

    Ok(Candle::new(
        number(&row[1], "open")?,
        number(&row[2], "high")?,
        number(&row[3], "low")?,
        number(&row[4], "close")?,
        number(&row[5], "volume")?,
        timestamp,
    ))
}

fn number(value: &Value, field: &str) -> Result<f64, SourceError> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| SourceError::Decode(format!("kline {} is not a finite number: {}", field, value)))
}
