//! Read-through key record cache
//!
//! Wraps any record repository with a moka cache keyed by fingerprint, the
//! verification pipeline's hot lookup. Staleness is bounded by the TTL for
//! plain reads, but every mutation invalidates the affected fingerprints
//! immediately: a revoked or rotated key must fail its very next
//! verification, regardless of any cached entry.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache as MokaCache;

use crate::domain::key::{KeyId, KeyRecord, KeyRecordRepository};
use crate::domain::namespace::NamespaceId;
use crate::domain::DomainError;
use crate::infrastructure::codec::constant_time_eq;

const DEFAULT_CAPACITY: u64 = 100_000;

#[derive(Debug)]
pub struct CachedKeyRepository<R: KeyRecordRepository> {
    inner: R,
    cache: MokaCache<String, KeyRecord>,
}

impl<R: KeyRecordRepository> CachedKeyRepository<R> {
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            cache: MokaCache::builder()
                .max_capacity(DEFAULT_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    async fn invalidate_for(&self, id: &KeyId) -> Result<Option<KeyRecord>, DomainError> {
        let prior = self.inner.get(id).await?;
        if let Some(record) = &prior {
            self.cache.invalidate(&record.fingerprint().to_string()).await;
        }
        Ok(prior)
    }
}

#[async_trait]
impl<R: KeyRecordRepository> KeyRecordRepository for CachedKeyRepository<R> {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<KeyRecord>, DomainError> {
        if let Some(record) = self.cache.get(fingerprint).await {
            // The cache resolves the key by ordinary hash/Eq; re-confirm
            // without an early exit so fingerprint equality stays
            // constant-time end to end.
            if constant_time_eq(record.fingerprint(), fingerprint) {
                return Ok(Some(record));
            }
        }

        let record = self.inner.find_by_fingerprint(fingerprint).await?;
        if let Some(record) = &record {
            self.cache
                .insert(fingerprint.to_string(), record.clone())
                .await;
        }
        Ok(record)
    }

    async fn get(&self, id: &KeyId) -> Result<Option<KeyRecord>, DomainError> {
        self.inner.get(id).await
    }

    async fn create(&self, record: KeyRecord) -> Result<KeyRecord, DomainError> {
        self.inner.create(record).await
    }

    async fn update(&self, record: &KeyRecord) -> Result<KeyRecord, DomainError> {
        // Invalidate the fingerprint currently on disk first; rotation
        // changes it and the old entry must not outlive the update.
        self.invalidate_for(record.id()).await?;
        let updated = self.inner.update(record).await?;
        self.cache
            .invalidate(&updated.fingerprint().to_string())
            .await;
        Ok(updated)
    }

    async fn delete(&self, id: &KeyId) -> Result<bool, DomainError> {
        self.invalidate_for(id).await?;
        self.inner.delete(id).await
    }

    async fn list(&self, namespace: Option<&NamespaceId>) -> Result<Vec<KeyRecord>, DomainError> {
        self.inner.list(namespace).await
    }

    async fn update_last_verified(
        &self,
        id: &KeyId,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        // A stale last_verified_at in cache is harmless; no invalidation.
        self.inner.update_last_verified(id, at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::key::InMemoryKeyRepository;

    fn cached() -> CachedKeyRepository<InMemoryKeyRepository> {
        CachedKeyRepository::new(InMemoryKeyRepository::new(), Duration::from_secs(30))
    }

    fn test_record(fingerprint: &str) -> KeyRecord {
        KeyRecord::new(
            KeyId::new(),
            fingerprint,
            "sk_test_ab12cd34...",
            NamespaceId::new(),
        )
    }

    #[tokio::test]
    async fn test_read_through_caches_hits() {
        let repo = cached();
        let record = test_record("fp-1");
        repo.create(record.clone()).await.unwrap();

        assert!(repo.find_by_fingerprint("fp-1").await.unwrap().is_some());

        // Delete underneath the cache; the cached entry still serves until
        // a mutation through this wrapper invalidates it.
        repo.inner.delete(record.id()).await.unwrap();
        assert!(repo.find_by_fingerprint("fp-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_revoke_style_update_invalidates_immediately() {
        let repo = cached();
        let mut record = test_record("fp-1");
        repo.create(record.clone()).await.unwrap();

        // Warm the cache
        repo.find_by_fingerprint("fp-1").await.unwrap();

        record.revoke(Utc::now());
        repo.update(&record).await.unwrap();

        let fetched = repo.find_by_fingerprint("fp-1").await.unwrap().unwrap();
        assert!(fetched.is_revoked());
    }

    #[tokio::test]
    async fn test_rotation_invalidates_old_fingerprint() {
        let repo = cached();
        let mut record = test_record("fp-old");
        repo.create(record.clone()).await.unwrap();
        repo.find_by_fingerprint("fp-old").await.unwrap();

        record.replace_credential("fp-new", "sk_test_xy98zw76...");
        repo.update(&record).await.unwrap();

        assert!(repo.find_by_fingerprint("fp-old").await.unwrap().is_none());
        assert!(repo.find_by_fingerprint("fp-new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_invalidates() {
        let repo = cached();
        let record = test_record("fp-1");
        repo.create(record.clone()).await.unwrap();
        repo.find_by_fingerprint("fp-1").await.unwrap();

        assert!(repo.delete(record.id()).await.unwrap());
        assert!(repo.find_by_fingerprint("fp-1").await.unwrap().is_none());
    }
}
