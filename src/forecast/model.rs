use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::error::ForecastError;
use crate::models::{ForecastPoint, Symbol};

/// A trained, read-only forecaster.
pub trait ForecastModel: Send + Sync {
    /// Up to `horizon` points spaced by `step`, starting after `anchor`.
    ///
    /// Callers still filter the output: a model is allowed to return points
    /// relative to its own training anchor.
    fn predict(&self, anchor: DateTime<Utc>, horizon: usize, step: Duration) -> Vec<ForecastPoint>;

    fn name(&self) -> &str;
}

/// Resolves the model for a symbol. `Ok(None)` means no artifact exists.
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn load(&self, symbol: &Symbol) -> Result<Option<Arc<dyn ForecastModel>>, ForecastError>;
}
