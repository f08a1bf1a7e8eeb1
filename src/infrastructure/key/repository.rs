//! In-memory key record repository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::key::{KeyId, KeyRecord, KeyRecordRepository};
use crate::domain::namespace::NamespaceId;
use crate::domain::DomainError;
use crate::infrastructure::codec::constant_time_eq;

#[derive(Debug, Default)]
pub struct InMemoryKeyRepository {
    records: RwLock<HashMap<Uuid, KeyRecord>>,
}

impl InMemoryKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyRecordRepository for InMemoryKeyRepository {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<KeyRecord>, DomainError> {
        let records = self.records.read().await;
        // Fingerprints are secret-derived; compare without an early exit.
        Ok(records
            .values()
            .find(|record| constant_time_eq(record.fingerprint(), fingerprint))
            .cloned())
    }

    async fn get(&self, id: &KeyId) -> Result<Option<KeyRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records.get(&id.as_uuid()).cloned())
    }

    async fn create(&self, record: KeyRecord) -> Result<KeyRecord, DomainError> {
        let mut records = self.records.write().await;

        if records.contains_key(&record.id().as_uuid()) {
            return Err(DomainError::conflict(format!(
                "key '{}' already exists",
                record.id()
            )));
        }
        if records
            .values()
            .any(|existing| constant_time_eq(existing.fingerprint(), record.fingerprint()))
        {
            return Err(DomainError::conflict("fingerprint already exists"));
        }

        records.insert(record.id().as_uuid(), record.clone());
        Ok(record)
    }

    async fn update(&self, record: &KeyRecord) -> Result<KeyRecord, DomainError> {
        let mut records = self.records.write().await;

        if !records.contains_key(&record.id().as_uuid()) {
            return Err(DomainError::not_found(format!(
                "key '{}' not found",
                record.id()
            )));
        }

        records.insert(record.id().as_uuid(), record.clone());
        Ok(record.clone())
    }

    async fn delete(&self, id: &KeyId) -> Result<bool, DomainError> {
        let mut records = self.records.write().await;
        Ok(records.remove(&id.as_uuid()).is_some())
    }

    async fn list(&self, namespace: Option<&NamespaceId>) -> Result<Vec<KeyRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| match namespace {
                Some(namespace_id) => record.namespace_id() == namespace_id,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn update_last_verified(
        &self,
        id: &KeyId,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        match records.get_mut(&id.as_uuid()) {
            Some(record) => {
                record.mark_verified(at);
                Ok(())
            }
            None => Err(DomainError::not_found(format!("key '{id}' not found"))),
        }
    }
}
