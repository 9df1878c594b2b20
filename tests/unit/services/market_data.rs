use candlecast::error::SourceError;
use candlecast::models::Candle;
use candlecast::services::binance::decode_kline;
use candlecast::services::market_data::normalize_candles;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid timestamp")
}

fn candle(at: DateTime<Utc>, close: f64) -> Candle {
    Candle::new(close, close, close, close, 1.0, at)
}

#[test]
fn test_normalize_sorts_dedups_and_filters() {
    let start = ts("2024-01-10T00:00:00Z");
    let raw = vec![
        candle(start + Duration::hours(2), 2.0),
        candle(start - Duration::hours(1), -1.0),
        candle(start, 0.0),
        candle(start + Duration::hours(1), 1.0),
        candle(start + Duration::hours(2), 2.5),
    ];

    let normalized = normalize_candles(raw, Some(start), 10);
    let closes: Vec<f64> = normalized.iter().map(|c| c.close).collect();
    assert_eq!(closes, vec![0.0, 1.0, 2.5]);
}

#[test]
fn test_normalize_caps_to_limit_keeping_oldest() {
    let start = ts("2024-01-10T00:00:00Z");
    let raw: Vec<Candle> = (0..5).map(|h| candle(start + Duration::hours(h), h as f64)).collect();

    let normalized = normalize_candles(raw, None, 3);
    assert_eq!(normalized.len(), 3);
    assert_eq!(normalized.last().map(|c| c.timestamp), Some(start + Duration::hours(2)));
}

#[test]
fn test_decode_kline_string_fields() {
    let row = json!([
        1704844800000i64,
        "46000.10",
        "46100.00",
        "45900.5",
        "46050.0",
        "123.45",
        1704848399999i64,
        "5683000.0",
        1000,
        "60.0",
        "2760000.0",
        "0"
    ]);
    let candle = decode_kline(row.as_array().unwrap()).expect("decodes");

    assert_eq!(candle.timestamp, ts("2024-01-10T00:00:00Z"));
    assert_eq!(candle.open, 46000.10);
    assert_eq!(candle.high, 46100.0);
    assert_eq!(candle.low, 45900.5);
    assert_eq!(candle.close, 46050.0);
    assert_eq!(candle.volume, 123.45);
}

#[test]
fn test_decode_kline_numeric_fields() {
    let row = json!([1704844800000i64, 1.0, 2.0, 0.5, 1.5, 10]);
    let candle = decode_kline(row.as_array().unwrap()).expect("decodes");
    assert_eq!(candle.close, 1.5);
    assert_eq!(candle.volume, 10.0);
}

#[test]
fn test_decode_kline_rejects_short_or_bad_rows() {
    let short = json!([1704844800000i64, "1", "2"]);
    assert!(matches!(decode_kline(short.as_array().unwrap()), Err(SourceError::Decode(_))));

    let bad_price = json!([1704844800000i64, "abc", "2", "1", "1", "1"]);
    assert!(matches!(decode_kline(bad_price.as_array().unwrap()), Err(SourceError::Decode(_))));

    let bad_time = json!(["yesterday", "1", "2", "1", "1", "1"]);
    assert!(matches!(decode_kline(bad_time.as_array().unwrap()), Err(SourceError::Decode(_))));
}

#[test]
fn test_source_error_transience() {
    assert!(SourceError::RateLimited(429).is_transient());
    assert!(SourceError::Timeout(std::time::Duration::from_secs(1)).is_transient());
    assert!(SourceError::Status { status: 503, body: String::new() }.is_transient());
    assert!(!SourceError::Status { status: 400, body: String::new() }.is_transient());
    assert!(!SourceError::Decode("bad".into()).is_transient());
}
