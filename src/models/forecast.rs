use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One predicted step.
///
/// Field names are part of the snapshot contract read by the dashboard:
/// `timestamp`, `yhat`, `yhat_lower`, `yhat_upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

impl ForecastPoint {
    pub fn new(timestamp: DateTime<Utc>, yhat: f64, yhat_lower: f64, yhat_upper: f64) -> Self {
        Self {
            timestamp,
            yhat,
            yhat_lower,
            yhat_upper,
        }
    }

    /// `yhat_lower <= yhat <= yhat_upper`. False for NaN values.
    pub fn bounds_hold(&self) -> bool {
        self.yhat_lower <= self.yhat && self.yhat <= self.yhat_upper
    }
}
