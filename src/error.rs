//! Typed errors for each pipeline stage.
//!
//! Every stage error can say whether it is worth retrying on the next cycle
//! tick (`is_transient`). Nothing is retried inside a cycle.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::jobs::types::Stage;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("market data request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("market data request timed out after {0:?}")]
    Timeout(Duration),

    #[error("market data source rate limited the request (status {0})")]
    RateLimited(u16),

    #[error("market data source returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed market data response: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Http(_) | SourceError::Timeout(_) | SourceError::RateLimited(_) => true,
            SourceError::Status { status, .. } => *status >= 500,
            SourceError::Decode(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to store: {0}")]
    Connect(String),

    #[error("store query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed store row: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, StoreError::Malformed(_))
    }

    /// The session behind the call is gone or stuck and should be replaced.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            StoreError::Connect(_) | StoreError::Timeout(_) => true,
            StoreError::Query(e) => e.is_closed(),
            StoreError::Unavailable(_) | StoreError::Malformed(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode model artifact {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),
}

impl ForecastError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ForecastError::Io { .. })
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("snapshot write timed out after {0:?}")]
    Timeout(Duration),
}

impl SnapshotError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, SnapshotError::Encode(_))
    }
}

/// Failure of one symbol's pass, tagged with the stage it happened in.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Source(#[from] SourceError),

    #[error("store error during {stage}: {source}")]
    Store {
        stage: Stage,
        #[source]
        source: StoreError,
    },

    #[error("forecast failed: {0}")]
    Forecast(#[from] ForecastError),

    #[error("snapshot publish failed: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("cancelled by shutdown before {0}")]
    Cancelled(Stage),
}

impl PipelineError {
    pub fn store(stage: Stage, source: StoreError) -> Self {
        PipelineError::Store { stage, source }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Source(_) => Stage::Fetch,
            PipelineError::Store { stage, .. } => *stage,
            PipelineError::Forecast(_) => Stage::Forecast,
            PipelineError::Snapshot(_) => Stage::Publish,
            PipelineError::Cancelled(stage) => *stage,
        }
    }

    /// Whether the next cadence tick can be expected to succeed without
    /// operator intervention.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Source(e) => e.is_transient(),
            PipelineError::Store { source, .. } => source.is_transient(),
            PipelineError::Forecast(e) => e.is_transient(),
            PipelineError::Snapshot(e) => e.is_transient(),
            PipelineError::Cancelled(_) => true,
        }
    }
}
