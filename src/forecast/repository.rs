//! File-backed model lookup with a per-symbol cache

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ForecastError;
use crate::forecast::artifact::ModelArtifact;
use crate::forecast::model::{ForecastModel, ModelSource};
use crate::models::Symbol;

/// Loads `model_<BASE>_<QUOTE>.json` from a directory.
///
/// A loaded artifact is reused until the file's modification time changes,
/// so a retrained model dropped into place is picked up on the next cycle.
pub struct ModelRepository {
    dir: PathBuf,
    cache: Mutex<HashMap<Symbol, (SystemTime, Arc<ModelArtifact>)>>,
}

impl ModelRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn artifact_path(&self, symbol: &Symbol) -> PathBuf {
        self.dir.join(format!("model_{}.json", symbol.file_stem()))
    }

    async fn forget(&self, symbol: &Symbol) {
        self.cache.lock().await.remove(symbol);
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ForecastError {
    ForecastError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl ModelSource for ModelRepository {
    async fn load(&self, symbol: &Symbol) -> Result<Option<Arc<dyn ForecastModel>>, ForecastError> {
        let path = self.artifact_path(symbol);

        let modified = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.modified().map_err(|e| io_error(&path, e))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.forget(symbol).await;
                return Ok(None);
            }
            Err(e) => return Err(io_error(&path, e)),
        };

        if let Some((cached_at, artifact)) = self.cache.lock().await.get(symbol) {
            if *cached_at == modified {
                debug!(symbol = %symbol, "Model cache hit");
                return Ok(Some(artifact.clone() as Arc<dyn ForecastModel>));
            }
        }

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.forget(symbol).await;
                return Ok(None);
            }
            Err(e) => return Err(io_error(&path, e)),
        };

        let artifact = Arc::new(ModelArtifact::from_json(&raw, &path)?);
        info!(
            symbol = %symbol,
            path = %path.display(),
            trained_at = %artifact.trained_at,
            "Loaded model artifact for {}",
            symbol
        );
        self.cache
            .lock()
            .await
            .insert(symbol.clone(), (modified, artifact.clone()));

        Ok(Some(artifact as Arc<dyn ForecastModel>))
    }
}
