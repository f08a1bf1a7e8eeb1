//! Key record repository trait

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::entity::{KeyId, KeyRecord};
use crate::domain::namespace::NamespaceId;
use crate::domain::DomainError;

/// Durable store of key records.
///
/// Implementations must enforce a unique constraint on the fingerprint.
#[async_trait]
pub trait KeyRecordRepository: Send + Sync + Debug {
    /// Look up a record by its credential fingerprint. This is the hot path
    /// of the verification pipeline.
    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<KeyRecord>, DomainError>;

    /// Get a record by its public id.
    async fn get(&self, id: &KeyId) -> Result<Option<KeyRecord>, DomainError>;

    /// Persist a new record.
    async fn create(&self, record: KeyRecord) -> Result<KeyRecord, DomainError>;

    /// Replace an existing record.
    async fn update(&self, record: &KeyRecord) -> Result<KeyRecord, DomainError>;

    /// Remove a record. Returns true when something was deleted.
    async fn delete(&self, id: &KeyId) -> Result<bool, DomainError>;

    /// List records, optionally scoped to a namespace.
    async fn list(&self, namespace: Option<&NamespaceId>) -> Result<Vec<KeyRecord>, DomainError>;

    /// Best-effort stamp of the last successful verification. May be
    /// eventually consistent; callers never block the decision path on
    /// a failure here.
    async fn update_last_verified(
        &self,
        id: &KeyId,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError>;
}
