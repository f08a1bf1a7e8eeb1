//! Asynchronous audit recorder
//!
//! Verification and admin paths hand events to a bounded queue and move on;
//! a background worker drains the queue into the durable store with retries.
//! Nothing on the decision path ever blocks on an audit write, and a failed
//! write never converts a decided ALLOW/DENY into an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

use crate::domain::audit::{AuditEvent, AuditStore};

const QUEUE_CAPACITY: usize = 1024;
const APPEND_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug)]
enum QueueMessage {
    Event(AuditEvent),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Clone)]
pub struct AuditRecorder {
    tx: mpsc::Sender<QueueMessage>,
}

impl AuditRecorder {
    /// Spawn the drain worker against the given store.
    pub fn spawn(store: Arc<dyn AuditStore>) -> Self {
        let (tx, mut rx) = mpsc::channel::<QueueMessage>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    QueueMessage::Event(event) => append_with_retry(&store, event).await,
                    QueueMessage::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { tx }
    }

    /// Enqueue an event, fire-and-forget. A full queue is logged loudly
    /// rather than backpressuring the verification path.
    pub fn record(&self, event: AuditEvent) {
        if let Err(err) = self.tx.try_send(QueueMessage::Event(event)) {
            error!("audit queue rejected event: {err}");
        }
    }

    /// Wait until every previously enqueued event has been written.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(QueueMessage::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn append_with_retry(store: &Arc<dyn AuditStore>, event: AuditEvent) {
    for attempt in 1..=APPEND_ATTEMPTS {
        match store.append(event.clone()).await {
            Ok(()) => return,
            Err(err) if attempt < APPEND_ATTEMPTS => {
                warn!(attempt, "audit append failed, retrying: {err}");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(err) => {
                error!(
                    action = event.action().as_str(),
                    "audit append failed after {APPEND_ATTEMPTS} attempts, event lost: {err}"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::{AuditAction, AuditOutcome};
    use crate::domain::key::KeyId;
    use crate::infrastructure::audit::InMemoryAuditStore;

    #[tokio::test]
    async fn test_events_reach_the_store() {
        let store = Arc::new(InMemoryAuditStore::new());
        let recorder = AuditRecorder::spawn(store.clone());
        let key_id = KeyId::new();

        for _ in 0..5 {
            recorder.record(
                AuditEvent::new(AuditAction::Verify, AuditOutcome::Allow)
                    .with_key(key_id, crate::domain::namespace::NamespaceId::new()),
            );
        }
        recorder.flush().await;

        let events = store.list_for_key(&key_id).await.unwrap();
        assert_eq!(events.len(), 5);
    }

    #[tokio::test]
    async fn test_record_does_not_block() {
        let store = Arc::new(InMemoryAuditStore::new());
        let recorder = AuditRecorder::spawn(store);

        // record() is synchronous; this is a compile-level guarantee, but
        // exercise the path anyway.
        recorder.record(AuditEvent::new(AuditAction::Create, AuditOutcome::Allow));
        recorder.flush().await;
    }
}
