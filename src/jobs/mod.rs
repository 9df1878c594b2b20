//! Per-symbol pipeline jobs

pub mod context;
pub mod handlers;
pub mod types;

pub use context::PipelineContext;
pub use types::{CycleReport, ForecastStatus, Stage, StageProgress, SymbolOutcome, SymbolReport};
