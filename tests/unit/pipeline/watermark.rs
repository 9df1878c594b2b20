use candlecast::db::{InMemoryStore, Measurement, TimeSeriesStore};
use candlecast::models::{Candle, Symbol};
use candlecast::pipeline::WatermarkResolver;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid timestamp")
}

fn btc() -> Symbol {
    "BTC/USDT".parse().unwrap()
}

fn candle(at: DateTime<Utc>) -> Candle {
    Candle::new(1.0, 1.0, 1.0, 1.0, 1.0, at)
}

#[tokio::test]
async fn test_watermark_is_newest_persisted_candle() {
    let store = Arc::new(InMemoryStore::new());
    let now = ts("2024-01-10T04:10:00Z");
    store
        .write_candles(
            &btc(),
            &[candle(ts("2024-01-09T22:00:00Z")), candle(ts("2024-01-10T00:00:00Z"))],
        )
        .await
        .unwrap();

    let resolver = WatermarkResolver::new(store, Duration::days(30));
    assert_eq!(resolver.resolve(&btc(), now).await, Some(ts("2024-01-10T00:00:00Z")));
}

#[tokio::test]
async fn test_no_data_falls_back_to_lookback_start() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = WatermarkResolver::new(store, Duration::days(30));
    let now = ts("2024-01-10T04:00:00Z");

    let watermark = resolver.resolve(&btc(), now).await;
    assert!(watermark.is_none());
    assert_eq!(resolver.fetch_start(watermark, now), now - Duration::days(30));
}

#[tokio::test]
async fn test_candles_older_than_lookback_are_ignored() {
    let store = Arc::new(InMemoryStore::new());
    let now = ts("2024-03-01T00:00:00Z");
    store
        .write_candles(&btc(), &[candle(ts("2024-01-01T00:00:00Z"))])
        .await
        .unwrap();

    let resolver = WatermarkResolver::new(store, Duration::days(30));
    assert!(resolver.resolve(&btc(), now).await.is_none());
}

#[tokio::test]
async fn test_store_failure_resolves_to_none() {
    let store = Arc::new(InMemoryStore::new());
    let now = ts("2024-01-10T04:00:00Z");
    store
        .write_candles(&btc(), &[candle(ts("2024-01-10T00:00:00Z"))])
        .await
        .unwrap();
    store.fail_reads(&btc(), Measurement::Ohlcv).await;

    let resolver = WatermarkResolver::new(store, Duration::days(30));
    let watermark = resolver.resolve(&btc(), now).await;
    assert!(watermark.is_none());
    // Widens the fetch window rather than narrowing it.
    assert!(resolver.fetch_start(watermark, now) < ts("2024-01-10T00:00:00Z"));
}

#[test]
fn test_fetch_start_includes_the_watermark() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = WatermarkResolver::new(store, Duration::days(30));
    let watermark = ts("2024-01-10T00:00:00Z");
    assert_eq!(
        resolver.fetch_start(Some(watermark), ts("2024-01-10T04:00:00Z")),
        watermark
    );
}
