use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timeframe '{0}': expected <n>m, <n>h or <n>d")]
pub struct ParseTimeframeError(pub String);

/// Candle width, parsed from exchange notation (`1m`, `15m`, `1h`, `1d`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeframe {
    label: String,
    seconds: i64,
}

impl Timeframe {
    pub fn hourly() -> Self {
        Self {
            label: "1h".to_string(),
            seconds: 3600,
        }
    }

    /// Exchange notation, passed verbatim as the kline `interval`.
    pub fn as_str(&self) -> &str {
        &self.label
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds)
    }

    /// Floor `ts` to the start of the bucket containing it.
    pub fn align_down(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        align_down(ts, self.duration())
    }
}

/// Floor `ts` to a multiple of `step` since the Unix epoch.
///
/// Steps shorter than one second leave `ts` untouched.
pub fn align_down(ts: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    let step_secs = step.num_seconds();
    if step_secs <= 0 {
        return ts;
    }
    let floored = ts.timestamp().div_euclid(step_secs) * step_secs;
    DateTime::from_timestamp(floored, 0).unwrap_or(ts)
}

/// Widest accepted candle, one 31-day month.
pub const MAX_TIMEFRAME_SECONDS: i64 = 31 * 86_400;

const UNITS: [(char, i64); 3] = [('m', 60), ('h', 3600), ('d', 86_400)];

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseTimeframeError(s.to_string());
        let label = s.trim();
        let (count, unit_seconds) = UNITS
            .iter()
            .find_map(|(suffix, secs)| label.strip_suffix(*suffix).map(|count| (count, *secs)))
            .ok_or_else(invalid)?;
        if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let count: i64 = count.parse().map_err(|_| invalid())?;
        if count <= 0 {
            return Err(invalid());
        }
        let seconds = count
            .checked_mul(unit_seconds)
            .filter(|secs| *secs <= MAX_TIMEFRAME_SECONDS)
            .ok_or_else(invalid)?;
        Ok(Self {
            label: label.to_string(),
            seconds,
        })
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
