//! In-memory audit store

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::audit::{AuditEvent, AuditStore};
use crate::domain::key::KeyId;
use crate::domain::DomainError;

#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, event: AuditEvent) -> Result<(), DomainError> {
        let mut events = self.events.write().await;
        events.push(event);
        Ok(())
    }

    async fn list_for_key(&self, key_id: &KeyId) -> Result<Vec<AuditEvent>, DomainError> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|event| event.key_id() == Some(key_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::{AuditAction, AuditOutcome};
    use crate::domain::namespace::NamespaceId;

    #[tokio::test]
    async fn test_append_and_filter() {
        let store = InMemoryAuditStore::new();
        let key_id = KeyId::new();
        let namespace_id = NamespaceId::new();

        store
            .append(
                AuditEvent::new(AuditAction::Create, AuditOutcome::Allow)
                    .with_key(key_id, namespace_id),
            )
            .await
            .unwrap();
        store
            .append(AuditEvent::new(AuditAction::Verify, AuditOutcome::Allow))
            .await
            .unwrap();

        assert_eq!(store.all().await.len(), 2);
        assert_eq!(store.list_for_key(&key_id).await.unwrap().len(), 1);
    }
}
