//! Per-symbol forecasting from pre-trained artifacts

pub mod artifact;
pub mod model;
pub mod repository;
pub mod runner;

pub use artifact::{ModelArtifact, Seasonality, Trend};
pub use model::{ForecastModel, ModelSource};
pub use repository::ModelRepository;
pub use runner::{sanitize_forecast, ForecastOutcome, ForecastRunner};
