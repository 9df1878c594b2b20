//! Store connection that is re-established lazily after it drops.
//!
//! The held connection is checked on every use; once it reports closed (or a
//! call fails with a connection-level error) the next caller reconnects with
//! exponential backoff. Concurrent callers share a single reconnect.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::StoreError;

#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Send + Sync;

    async fn connect(&self) -> Result<Self::Connection, StoreError>;

    fn is_closed(&self, connection: &Self::Connection) -> bool;
}

/// Backoff shared by startup and in-cycle reconnects; `retries` excludes the first attempt.
pub fn backoff(retries: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(10))
        .with_max_times(retries)
}

pub struct ConnectionSlot<C: Connector> {
    connector: C,
    retries: usize,
    current: RwLock<Option<Arc<C::Connection>>>,
}

impl<C: Connector> ConnectionSlot<C> {
    /// An empty slot; `retries` applies to reconnects made by [`get`](Self::get).
    pub fn new(connector: C, retries: usize) -> Self {
        Self {
            connector,
            retries,
            current: RwLock::new(None),
        }
    }

    /// Connect now with its own retry budget, replacing whatever is held.
    pub async fn establish(&self, retries: usize) -> Result<(), StoreError> {
        let connection = Arc::new(self.connect_with_retry(retries).await?);
        *self.current.write().await = Some(connection);
        Ok(())
    }

    /// The held connection, or a fresh one if none is held or it has closed.
    pub async fn get(&self) -> Result<Arc<C::Connection>, StoreError> {
        if let Some(connection) = self.live().await {
            return Ok(connection);
        }

        let mut current = self.current.write().await;
        // Someone else may have reconnected while we waited for the lock.
        if let Some(connection) = current.as_ref().filter(|c| !self.connector.is_closed(c)) {
            return Ok(connection.clone());
        }

        let lost = current.take().is_some();
        if lost {
            warn!("Store connection lost, reconnecting");
        }
        let connection = Arc::new(self.connect_with_retry(self.retries).await?);
        *current = Some(connection.clone());
        if lost {
            info!("Store connection re-established");
        }
        Ok(connection)
    }

    /// Forget `stale` so the next [`get`](Self::get) reconnects. A connection
    /// that already replaced it is left alone.
    pub async fn invalidate(&self, stale: &Arc<C::Connection>) {
        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, stale)) {
            *current = None;
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.live().await.is_some()
    }

    async fn live(&self) -> Option<Arc<C::Connection>> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|c| !self.connector.is_closed(c))
            .cloned()
    }

    async fn connect_with_retry(&self, retries: usize) -> Result<C::Connection, StoreError> {
        (|| async { self.connector.connect().await })
            .retry(backoff(retries))
            .sleep(tokio::time::sleep)
            .notify(|err: &StoreError, dur: Duration| {
                warn!(error = %err, retry_in_ms = dur.as_millis() as u64, "Store connection failed, retrying");
            })
            .await
    }
}
