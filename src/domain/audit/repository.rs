//! Append-only audit store trait

use std::fmt::Debug;

use async_trait::async_trait;

use super::event::AuditEvent;
use crate::domain::key::KeyId;
use crate::domain::DomainError;

/// Durable append-only store for audit events. Events are immutable once
/// written; there is no update or delete.
#[async_trait]
pub trait AuditStore: Send + Sync + Debug {
    async fn append(&self, event: AuditEvent) -> Result<(), DomainError>;

    async fn list_for_key(&self, key_id: &KeyId) -> Result<Vec<AuditEvent>, DomainError>;
}
