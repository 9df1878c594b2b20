use candlecast::models::{align_down, Timeframe};
use chrono::{DateTime, Duration, Utc};

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid timestamp")
}

#[test]
fn test_parse_units() {
    assert_eq!("1m".parse::<Timeframe>().unwrap().seconds(), 60);
    assert_eq!("15m".parse::<Timeframe>().unwrap().seconds(), 900);
    assert_eq!("4h".parse::<Timeframe>().unwrap().seconds(), 14_400);
    assert_eq!("1d".parse::<Timeframe>().unwrap().seconds(), 86_400);
    assert_eq!(Timeframe::hourly().duration(), Duration::hours(1));
}

#[test]
fn test_parse_rejects_garbage() {
    for input in ["", "h", "0h", "-1h", "1w", "1.5h", "hourly"] {
        assert!(input.parse::<Timeframe>().is_err(), "{} should be rejected", input);
    }
}

#[test]
fn test_parse_rejects_non_ascii_and_oversized_input() {
    for input in ["1é", "é", "1ĥ", "+1h", "9000000000000000h", "99999999999999999999m", "32d", "745h"] {
        assert!(input.parse::<Timeframe>().is_err(), "{} should be rejected", input);
    }
    assert_eq!("31d".parse::<Timeframe>().unwrap().seconds(), 31 * 86_400);
}

#[test]
fn test_align_down() {
    let hourly = Timeframe::hourly();
    assert_eq!(hourly.align_down(ts("2024-01-10T05:37:12Z")), ts("2024-01-10T05:00:00Z"));
    assert_eq!(hourly.align_down(ts("2024-01-10T05:00:00Z")), ts("2024-01-10T05:00:00Z"));
    assert_eq!(
        align_down(ts("2024-01-10T05:37:12Z"), Duration::minutes(15)),
        ts("2024-01-10T05:30:00Z")
    );
}
