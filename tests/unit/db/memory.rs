use candlecast::db::{InMemoryStore, Measurement, TimeSeriesStore};
use candlecast::error::StoreError;
use candlecast::models::{Candle, ForecastPoint, Symbol};
use chrono::{DateTime, Duration, Utc};

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid timestamp")
}

fn btc() -> Symbol {
    "BTC/USDT".parse().unwrap()
}

fn candle(at: DateTime<Utc>, close: f64) -> Candle {
    Candle::new(close, close, close, close, 1.0, at)
}

#[tokio::test]
async fn test_upsert_replaces_same_timestamp() {
    let store = InMemoryStore::new();
    let at = ts("2024-01-10T00:00:00Z");

    store.write_candles(&btc(), &[candle(at, 1.0)]).await.unwrap();
    store.write_candles(&btc(), &[candle(at, 2.0)]).await.unwrap();

    let rows = store.candles(&btc()).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].close, 2.0);
}

#[tokio::test]
async fn test_query_last_respects_window() {
    let store = InMemoryStore::new();
    let at = ts("2024-01-10T00:00:00Z");
    store
        .write_candles(&btc(), &[candle(at, 1.0), candle(at + Duration::hours(3), 2.0)])
        .await
        .unwrap();

    let last = store.query_last(&btc(), at - Duration::days(1)).await.unwrap();
    assert_eq!(last.map(|c| c.timestamp), Some(at + Duration::hours(3)));

    let none = store.query_last(&btc(), at + Duration::hours(4)).await.unwrap();
    assert!(none.is_none());

    let other: Symbol = "ETH/USDT".parse().unwrap();
    assert!(store.query_last(&other, at).await.unwrap().is_none());
}

#[tokio::test]
async fn test_ranges_are_inclusive() {
    let store = InMemoryStore::new();
    let at = ts("2024-01-10T00:00:00Z");
    let candles: Vec<Candle> = (0..5).map(|h| candle(at + Duration::hours(h), h as f64)).collect();
    store.write_candles(&btc(), &candles).await.unwrap();

    let range = store
        .query_candles(&btc(), at + Duration::hours(1), at + Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(range.len(), 3);

    let empty = store
        .query_candles(&btc(), at + Duration::hours(3), at + Duration::hours(1))
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_forecast_rows_keep_generation_time() {
    let store = InMemoryStore::new();
    let target = ts("2024-01-10T06:00:00Z");
    let first = ts("2024-01-10T05:00:00Z");
    let second = ts("2024-01-10T05:01:00Z");

    store
        .write_forecast(&btc(), &[ForecastPoint::new(target, 1.0, 0.0, 2.0)], first)
        .await
        .unwrap();
    store
        .write_forecast(&btc(), &[ForecastPoint::new(target, 1.5, 0.5, 2.5)], second)
        .await
        .unwrap();

    let rows = store.predictions(&btc()).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].generated_at, second);
    assert_eq!(rows[0].point.yhat, 1.5);
}

#[tokio::test]
async fn test_failure_injection_and_heal() {
    let store = InMemoryStore::new();
    let at = ts("2024-01-10T00:00:00Z");
    store.fail_writes(&btc(), Measurement::Ohlcv).await;

    let err = store.write_candles(&btc(), &[candle(at, 1.0)]).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    assert!(err.is_transient());

    // Predictions are unaffected by an ohlcv failure.
    store
        .write_forecast(&btc(), &[ForecastPoint::new(at, 1.0, 0.0, 2.0)], at)
        .await
        .unwrap();

    store.heal(&btc()).await;
    assert_eq!(store.write_candles(&btc(), &[candle(at, 1.0)]).await.unwrap(), 1);
}
