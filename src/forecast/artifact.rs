//! Serialized additive forecasting model.
//!
//! The offline trainer exports a piecewise-free linear trend plus Fourier
//! seasonal terms and a residual spread:
//!
//! ```text
//! yhat(t) = level + slope_per_hour * hours(t - trend.anchor)
//!         + Σ_s Σ_k a_sk cos(2πk·h(t)/P_s) + b_sk sin(2πk·h(t)/P_s)
//! ```
//!
//! where `h(t)` is hours since the Unix epoch. The band at step `i` is
//! `yhat ± interval_z · residual_std · √i`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

use crate::error::ForecastError;
use crate::forecast::model::ForecastModel;
use crate::models::{align_down, ForecastPoint};

/// z-score of a two-sided 80% interval.
pub const DEFAULT_INTERVAL_Z: f64 = 1.2816;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub anchor: DateTime<Utc>,
    pub level: f64,
    pub slope_per_hour: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seasonality {
    pub period_hours: f64,
    /// `[a_k, b_k]` for harmonics k = 1..=n.
    pub coefficients: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub symbol: String,
    pub trained_at: DateTime<Utc>,
    pub trend: Trend,
    #[serde(default)]
    pub seasonalities: Vec<Seasonality>,
    pub residual_std: f64,
    #[serde(default = "default_interval_z")]
    pub interval_z: f64,
}

fn default_interval_z() -> f64 {
    DEFAULT_INTERVAL_Z
}

impl ModelArtifact {
    pub fn from_json(raw: &str, path: &Path) -> Result<Self, ForecastError> {
        let artifact: Self = serde_json::from_str(raw).map_err(|source| ForecastError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        let finite = |v: f64| v.is_finite();
        if !finite(self.trend.level) || !finite(self.trend.slope_per_hour) {
            return Err(ForecastError::InvalidArtifact("trend parameters must be finite".into()));
        }
        if !finite(self.residual_std) || self.residual_std < 0.0 {
            return Err(ForecastError::InvalidArtifact(
                "residual_std must be a finite, non-negative number".into(),
            ));
        }
        if !finite(self.interval_z) || self.interval_z < 0.0 {
            return Err(ForecastError::InvalidArtifact(
                "interval_z must be a finite, non-negative number".into(),
            ));
        }
        for season in &self.seasonalities {
            if !finite(season.period_hours) || season.period_hours <= 0.0 {
                return Err(ForecastError::InvalidArtifact(format!(
                    "seasonality period {} must be positive",
                    season.period_hours
                )));
            }
            if season.coefficients.iter().flatten().any(|c| !c.is_finite()) {
                return Err(ForecastError::InvalidArtifact(
                    "seasonality coefficients must be finite".into(),
                ));
            }
        }
        Ok(())
    }

    fn trend_at(&self, ts: DateTime<Utc>) -> f64 {
        let hours = (ts - self.trend.anchor).num_seconds() as f64 / 3600.0;
        self.trend.level + self.trend.slope_per_hour * hours
    }

    fn seasonal_at(&self, ts: DateTime<Utc>) -> f64 {
        let hours = ts.timestamp() as f64 / 3600.0;
        self.seasonalities
            .iter()
            .map(|season| {
                season
                    .coefficients
                    .iter()
                    .enumerate()
                    .map(|(i, [a, b])| {
                        let angle = 2.0 * PI * (i as f64 + 1.0) * hours / season.period_hours;
                        a * angle.cos() + b * angle.sin()
                    })
                    .sum::<f64>()
            })
            .sum()
    }
}

impl ForecastModel for ModelArtifact {
    fn predict(&self, anchor: DateTime<Utc>, horizon: usize, step: Duration) -> Vec<ForecastPoint> {
        // Stepping stops early rather than overflow at the far end of the calendar.
        (1..=horizon)
            .scan(align_down(anchor, step), |at, i| {
                *at = at.checked_add_signed(step)?;
                Some((i, *at))
            })
            .map(|(i, timestamp)| {
                let yhat = self.trend_at(timestamp) + self.seasonal_at(timestamp);
                let half_width = self.interval_z * self.residual_std * (i as f64).sqrt();
                ForecastPoint::new(timestamp, yhat, yhat - half_width, yhat + half_width)
            })
            .collect()
    }

    fn name(&self) -> &str {
        "additive"
    }
}
