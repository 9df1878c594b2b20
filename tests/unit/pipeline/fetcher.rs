use async_trait::async_trait;
use candlecast::error::SourceError;
use candlecast::models::{Candle, Symbol, Timeframe};
use candlecast::pipeline::IncrementalFetcher;
use candlecast::services::MarketDataSource;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid timestamp")
}

/// Returns a fixed response and remembers the last request.
struct RecordingSource {
    response: Vec<Candle>,
    fail: bool,
    last_request: Mutex<Option<(Option<DateTime<Utc>>, usize, String)>>,
}

impl RecordingSource {
    fn new(response: Vec<Candle>) -> Self {
        Self {
            response,
            fail: false,
            last_request: Mutex::new(None),
        }
    }
}

#[async_trait]
impl MarketDataSource for RecordingSource {
    async fn fetch_candles(
        &self,
        _symbol: &Symbol,
        timeframe: &Timeframe,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        *self.last_request.lock().unwrap() = Some((since, limit, timeframe.to_string()));
        if self.fail {
            return Err(SourceError::RateLimited(429));
        }
        Ok(self.response.clone())
    }
}

fn candle(at: DateTime<Utc>, close: f64) -> Candle {
    Candle::new(close, close, close, close, 1.0, at)
}

#[tokio::test]
async fn test_passes_start_and_page_size() {
    let source = Arc::new(RecordingSource::new(vec![]));
    let fetcher = IncrementalFetcher::new(source.clone(), Timeframe::hourly(), 500);
    let start = ts("2024-01-10T00:00:00Z");

    let candles = fetcher.fetch(&"BTC/USDT".parse().unwrap(), start).await.unwrap();
    assert!(candles.is_empty());

    let request = source.last_request.lock().unwrap().clone();
    assert_eq!(request, Some((Some(start), 500, "1h".to_string())));
}

#[tokio::test]
async fn test_output_is_ordered_and_starts_at_start() {
    let start = ts("2024-01-10T00:00:00Z");
    let source = Arc::new(RecordingSource::new(vec![
        candle(start + Duration::hours(2), 2.0),
        candle(start - Duration::hours(1), -1.0),
        candle(start, 0.0),
        candle(start + Duration::hours(1), 1.0),
    ]));
    let fetcher = IncrementalFetcher::new(source, Timeframe::hourly(), 1000);

    let candles = fetcher.fetch(&"BTC/USDT".parse().unwrap(), start).await.unwrap();
    let times: Vec<DateTime<Utc>> = candles.iter().map(|c| c.timestamp).collect();
    assert_eq!(
        times,
        vec![start, start + Duration::hours(1), start + Duration::hours(2)]
    );
}

#[tokio::test]
async fn test_source_failure_propagates() {
    let mut source = RecordingSource::new(vec![]);
    source.fail = true;
    let fetcher = IncrementalFetcher::new(Arc::new(source), Timeframe::hourly(), 1000);

    let err = fetcher
        .fetch(&"BTC/USDT".parse().unwrap(), ts("2024-01-10T00:00:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::RateLimited(429)));
    assert!(err.is_transient());
}
