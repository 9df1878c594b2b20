use async_trait::async_trait;
use candlecast::db::{ConnectionSlot, Connector};
use candlecast::error::StoreError;
use futures_util::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Session {
    id: usize,
    closed: AtomicBool,
}

/// Hands out numbered sessions; the next `failures` attempts are refused.
#[derive(Default)]
struct FlakyServer {
    attempts: AtomicUsize,
    failures: AtomicUsize,
}

struct FlakyConnector(Arc<FlakyServer>);

#[async_trait]
impl Connector for FlakyConnector {
    type Connection = Session;

    async fn connect(&self) -> Result<Session, StoreError> {
        let server = &self.0;
        let id = server.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(10)).await;
        if server
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Connect("connection refused".to_string()));
        }
        Ok(Session {
            id,
            closed: AtomicBool::new(false),
        })
    }

    fn is_closed(&self, session: &Session) -> bool {
        session.closed.load(Ordering::SeqCst)
    }
}

fn slot(retries: usize) -> (Arc<FlakyServer>, ConnectionSlot<FlakyConnector>) {
    let server = Arc::new(FlakyServer::default());
    (server.clone(), ConnectionSlot::new(FlakyConnector(server), retries))
}

#[tokio::test]
async fn test_connects_lazily_and_reuses_the_session() {
    let (server, slot) = slot(0);
    assert!(!slot.is_connected().await);

    let first = slot.get().await.unwrap();
    let again = slot.get().await.unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(server.attempts.load(Ordering::SeqCst), 1);
    assert!(slot.is_connected().await);
}

#[tokio::test]
async fn test_closed_session_is_replaced_on_next_call() {
    let (server, slot) = slot(0);
    slot.establish(0).await.unwrap();
    let first = slot.get().await.unwrap();

    // The server went away under us.
    first.closed.store(true, Ordering::SeqCst);
    assert!(!slot.is_connected().await);

    let second = slot.get().await.unwrap();
    assert_ne!(first.id, second.id);
    assert!(slot.is_connected().await);
    assert_eq!(server.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_reconnect_is_retried_by_a_later_call() {
    let (server, slot) = slot(0);
    slot.establish(0).await.unwrap();
    slot.get().await.unwrap().closed.store(true, Ordering::SeqCst);

    server.failures.store(1, Ordering::SeqCst);
    let err = slot.get().await.err().expect("server still down");
    assert!(matches!(err, StoreError::Connect(_)));
    assert!(err.is_transient());
    assert!(!slot.is_connected().await);

    let session = slot.get().await.unwrap();
    assert!(!session.closed.load(Ordering::SeqCst));
    assert!(slot.is_connected().await);
}

#[tokio::test]
async fn test_reconnect_backs_off_within_its_budget() {
    let (server, slot) = slot(1);
    server.failures.store(1, Ordering::SeqCst);

    let session = slot.get().await.unwrap();
    assert_eq!(session.id, 2);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_reconnect() {
    let (server, slot) = slot(0);
    slot.establish(0).await.unwrap();
    slot.get().await.unwrap().closed.store(true, Ordering::SeqCst);

    let sessions = join_all((0..8).map(|_| slot.get())).await;
    let ids: Vec<usize> = sessions.into_iter().map(|s| s.unwrap().id).collect();
    assert!(ids.iter().all(|id| *id == 2), "{:?}", ids);
    assert_eq!(server.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalidate_only_drops_the_stale_session() {
    let (_server, slot) = slot(0);
    let stale = slot.get().await.unwrap();
    slot.invalidate(&stale).await;
    let fresh = slot.get().await.unwrap();
    assert_ne!(stale.id, fresh.id);

    // A late report about the old session must not discard the new one.
    slot.invalidate(&stale).await;
    assert_eq!(slot.get().await.unwrap().id, fresh.id);
}
