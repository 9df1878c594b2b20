//! Outcome types for one symbol's pass through the pipeline

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::models::Symbol;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Watermark,
    Fetch,
    WriteCandles,
    Forecast,
    WriteForecast,
    Publish,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Watermark,
        Stage::Fetch,
        Stage::WriteCandles,
        Stage::Forecast,
        Stage::WriteForecast,
        Stage::Publish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Watermark => "watermark",
            Stage::Fetch => "fetch",
            Stage::WriteCandles => "write_candles",
            Stage::Forecast => "forecast",
            Stage::WriteForecast => "write_forecast",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last stage a symbol task entered, readable after the task is gone.
///
/// Lets the cycle attribute a panicked task to the stage it died in.
#[derive(Debug, Clone, Default)]
pub struct StageProgress(Arc<AtomicUsize>);

impl StageProgress {
    pub fn enter(&self, stage: Stage) {
        let index = Stage::ALL.iter().position(|s| *s == stage).unwrap_or(0);
        self.0.store(index, Ordering::SeqCst);
    }

    pub fn current(&self) -> Stage {
        Stage::ALL
            .get(self.0.load(Ordering::SeqCst))
            .copied()
            .unwrap_or(Stage::Watermark)
    }
}

/// What happened to the forecast step of a completed pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ForecastStatus {
    Published { points: usize },
    ModelMissing,
    /// The model produced nothing after `now`.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SymbolOutcome {
    Completed {
        candles_written: usize,
        forecast: ForecastStatus,
        watermark: Option<DateTime<Utc>>,
        history_published: bool,
    },
    Failed {
        stage: Stage,
        transient: bool,
        reason: String,
    },
    Cancelled {
        stage: Stage,
    },
}

impl SymbolOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SymbolOutcome::Completed { .. } => "completed",
            SymbolOutcome::Failed { .. } => "failed",
            SymbolOutcome::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, SymbolOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolReport {
    pub symbol: Symbol,
    pub outcome: SymbolOutcome,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Result of one full pass over the configured symbols, in configured order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<SymbolReport>,
}

impl CycleReport {
    pub fn completed(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome.is_completed())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, SymbolOutcome::Failed { .. }))
            .count()
    }

    pub fn outcome_for(&self, symbol: &Symbol) -> Option<&SymbolOutcome> {
        self.reports
            .iter()
            .find(|r| &r.symbol == symbol)
            .map(|r| &r.outcome)
    }
}
