use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ForecastError;
use crate::forecast::model::ModelSource;
use crate::models::{ForecastPoint, Symbol};

#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    /// No artifact for this symbol. Not an error.
    ModelMissing,
    Produced(Vec<ForecastPoint>),
}

/// Produces the bounded-horizon forecast for one symbol, anchored at `now`.
pub struct ForecastRunner {
    models: Arc<dyn ModelSource>,
    horizon: usize,
    step: Duration,
}

impl ForecastRunner {
    pub fn new(models: Arc<dyn ModelSource>, horizon: usize, step: Duration) -> Self {
        Self {
            models,
            horizon,
            step,
        }
    }

    pub async fn run(&self, symbol: &Symbol, now: DateTime<Utc>) -> Result<ForecastOutcome, ForecastError> {
        let Some(model) = self.models.load(symbol).await? else {
            return Ok(ForecastOutcome::ModelMissing);
        };

        let raw = model.predict(now, self.horizon, self.step);
        let produced = raw.len();
        let points = sanitize_forecast(raw, now, self.horizon, self.step);

        if points.len() < produced {
            debug!(
                symbol = %symbol,
                model = model.name(),
                produced,
                kept = points.len(),
                "Dropped forecast points at or before now, out of step, or past the horizon"
            );
        }

        let violations = points.iter().filter(|p| !p.bounds_hold()).count();
        if violations > 0 {
            warn!(
                symbol = %symbol,
                model = model.name(),
                violations,
                "Forecast points with yhat outside [yhat_lower, yhat_upper]"
            );
        }

        Ok(ForecastOutcome::Produced(points))
    }
}

/// Keep what a forecast is allowed to contain: points strictly after `now`,
/// strictly increasing, contiguous at `step`, at most `horizon` of them.
///
/// Contiguity is taken from the first surviving point; the run stops at the
/// first gap. Bound violations are left as-is for the caller to report.
pub fn sanitize_forecast(
    mut points: Vec<ForecastPoint>,
    now: DateTime<Utc>,
    horizon: usize,
    step: Duration,
) -> Vec<ForecastPoint> {
    points.retain(|p| p.timestamp > now);
    points.sort_by_key(|p| p.timestamp);
    points.dedup_by_key(|p| p.timestamp);

    let mut kept: Vec<ForecastPoint> = Vec::with_capacity(horizon.min(points.len()));
    for point in points {
        if kept.len() == horizon {
            break;
        }
        if let Some(last) = kept.last() {
            if point.timestamp != last.timestamp + step {
                break;
            }
        }
        kept.push(point);
    }
    kept
}
