//! Snapshot files for the read path.
//!
//! Each file is replaced whole: the document is written to a numbered
//! `.tmp` sibling, fsynced and renamed over the old one, so a reader sees
//! either the previous complete snapshot or the new one. Writes to one
//! path are numbered as they are issued; a write that finishes after a
//! newer one has landed (for instance after timing out) is discarded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::SnapshotError;
use crate::models::{Candle, ForecastPoint, ForecastSnapshot, HistorySnapshot, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    History,
    Prediction,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::History => "history",
            SnapshotKind::Prediction => "prediction",
        }
    }
}

/// Write ordering for one snapshot path.
#[derive(Default)]
struct PathSequence {
    issued: AtomicU64,
    /// Generation of the document currently in place; held across the write.
    landed: Mutex<u64>,
}

pub struct SnapshotPublisher {
    dir: PathBuf,
    timeout: Duration,
    sequences: Mutex<HashMap<PathBuf, Arc<PathSequence>>>,
}

impl SnapshotPublisher {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
            sequences: Mutex::new(HashMap::new()),
        }
    }

    pub fn path_for(&self, kind: SnapshotKind, symbol: &Symbol) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", kind.as_str(), symbol.file_stem()))
    }

    pub fn history_path(&self, symbol: &Symbol) -> PathBuf {
        self.path_for(SnapshotKind::History, symbol)
    }

    pub fn forecast_path(&self, symbol: &Symbol) -> PathBuf {
        self.path_for(SnapshotKind::Prediction, symbol)
    }

    pub async fn publish_history(
        &self,
        symbol: &Symbol,
        candles: Vec<Candle>,
        now: DateTime<Utc>,
    ) -> Result<HistorySnapshot, SnapshotError> {
        let snapshot = HistorySnapshot::new(symbol.to_string(), now, candles);
        self.write_json(&self.history_path(symbol), &snapshot).await?;
        Ok(snapshot)
    }

    pub async fn publish_forecast(
        &self,
        symbol: &Symbol,
        points: Vec<ForecastPoint>,
        now: DateTime<Utc>,
    ) -> Result<ForecastSnapshot, SnapshotError> {
        let snapshot = ForecastSnapshot::new(symbol.to_string(), now, points);
        self.write_json(&self.forecast_path(symbol), &snapshot).await?;
        Ok(snapshot)
    }

    async fn write_json<T: Serialize>(&self, path: &Path, document: &T) -> Result<(), SnapshotError> {
        let bytes = serde_json::to_vec_pretty(document)?;
        let size = bytes.len();
        let sequence = self.sequence_for(path);
        let generation = sequence.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let target = path.to_path_buf();

        // The blocking write keeps running if we stop waiting for it.
        let write = tokio::task::spawn_blocking(move || -> Result<(), SnapshotError> {
            let mut landed = sequence.landed.lock().unwrap_or_else(PoisonError::into_inner);
            if *landed > generation {
                warn!(path = %target.display(), generation, "Discarding superseded snapshot write");
                return Ok(());
            }
            write_atomic(&target, &tmp_path(&target, generation), &bytes)?;
            *landed = generation;
            Ok(())
        });

        match tokio::time::timeout(self.timeout, write).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join)) => {
                return Err(SnapshotError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::other(join),
                })
            }
            Err(_) => return Err(SnapshotError::Timeout(self.timeout)),
        }
        debug!(path = %path.display(), bytes = size, generation, "Snapshot replaced");
        Ok(())
    }

    fn sequence_for(&self, path: &Path) -> Arc<PathSequence> {
        let mut sequences = self.sequences.lock().unwrap_or_else(PoisonError::into_inner);
        sequences.entry(path.to_path_buf()).or_default().clone()
    }
}

/// `history_BTC_USDT.json` -> `history_BTC_USDT.json.<generation>.tmp`
pub fn tmp_path(path: &Path, generation: u64) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.tmp", generation));
    path.with_file_name(name)
}

fn write_atomic(path: &Path, tmp: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let io_err = |p: &Path| {
        let p = p.to_path_buf();
        move |source| SnapshotError::Io { path: p, source }
    };

    let result = File::create(tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .map_err(io_err(tmp))
        .and_then(|()| std::fs::rename(tmp, path).map_err(io_err(path)));

    if result.is_err() {
        // The live file is untouched; only the partial sibling needs to go.
        let _ = std::fs::remove_file(tmp);
    }
    result
}
