//! Key lifecycle service
//!
//! High-level admin operations over key records: create, update, rotate,
//! revoke and delete, plus namespace management. Every mutation validates its
//! input, persists through the repository and leaves an audit event. The raw
//! key is returned exactly once, from create and rotate; it is never stored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::info;

use crate::domain::audit::{AuditAction, AuditEvent, AuditOutcome};
use crate::domain::counter::CounterStore;
use crate::domain::key::{
    validate_ip_whitelist, validate_key_name, validate_quota, validate_rate_limit, KeyId,
    KeyRecord, KeyRecordRepository, QuotaConfig, RateLimitConfig,
};
use crate::domain::namespace::{Namespace, NamespaceId, NamespaceRepository};
use crate::domain::DomainError;

use super::audit::AuditRecorder;
use super::codec::CredentialCodec;
use super::quota::QuotaTracker;

/// Parameters for creating a key
#[derive(Debug, Clone)]
pub struct NewKey {
    pub namespace_id: NamespaceId,
    pub name: Option<String>,
    pub owner_id: Option<String>,
    pub metadata: Map<String, Value>,
    pub ip_whitelist: Vec<String>,
    /// When absent, the service applies its configured default
    pub rate_limit: Option<RateLimitConfig>,
    pub quota: Option<QuotaConfig>,
    pub expires_at: Option<DateTime<Utc>>,
    pub delete_protected: bool,
}

impl NewKey {
    pub fn in_namespace(namespace_id: NamespaceId) -> Self {
        Self {
            namespace_id,
            name: None,
            owner_id: None,
            metadata: Map::new(),
            ip_whitelist: Vec::new(),
            rate_limit: None,
            quota: None,
            expires_at: None,
            delete_protected: false,
        }
    }
}

/// Partial update of a key record. `None` leaves the field untouched; for
/// clearable fields the inner option distinguishes "set" from "clear".
#[derive(Debug, Clone, Default)]
pub struct KeyUpdate {
    pub name: Option<Option<String>>,
    pub owner_id: Option<Option<String>>,
    pub metadata: Option<Map<String, Value>>,
    pub ip_whitelist: Option<Vec<String>>,
    pub rate_limit: Option<Option<RateLimitConfig>>,
    pub quota: Option<Option<QuotaConfig>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub delete_protected: Option<bool>,
}

impl KeyUpdate {
    fn updated_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.owner_id.is_some() {
            fields.push("owner_id");
        }
        if self.metadata.is_some() {
            fields.push("metadata");
        }
        if self.ip_whitelist.is_some() {
            fields.push("ip_whitelist");
        }
        if self.rate_limit.is_some() {
            fields.push("rate_limit");
        }
        if self.quota.is_some() {
            fields.push("quota");
        }
        if self.expires_at.is_some() {
            fields.push("expires_at");
        }
        if self.delete_protected.is_some() {
            fields.push("delete_protected");
        }
        fields
    }
}

/// Caller context attached to the audit event of a mutation
#[derive(Debug, Clone, Default)]
pub struct Actor {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Result of creating or rotating a key
#[derive(Debug)]
pub struct CreatedKey {
    pub record: KeyRecord,
    /// The full raw key. Shown once; never persisted or logged.
    pub raw_key: String,
}

pub struct KeyService {
    codec: CredentialCodec,
    keys: Arc<dyn KeyRecordRepository>,
    namespaces: Arc<dyn NamespaceRepository>,
    quota: QuotaTracker,
    audit: AuditRecorder,
    default_rate_limit: Option<RateLimitConfig>,
}

impl std::fmt::Debug for KeyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyService")
            .field("default_rate_limit", &self.default_rate_limit)
            .finish_non_exhaustive()
    }
}

impl KeyService {
    pub fn new(
        codec: CredentialCodec,
        keys: Arc<dyn KeyRecordRepository>,
        namespaces: Arc<dyn NamespaceRepository>,
        counters: Arc<dyn CounterStore>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            codec,
            keys,
            namespaces,
            quota: QuotaTracker::new(counters),
            audit,
            default_rate_limit: None,
        }
    }

    /// Rate limit applied to new keys whose creation request carries none
    pub fn with_default_rate_limit(mut self, rate_limit: Option<RateLimitConfig>) -> Self {
        self.default_rate_limit = rate_limit;
        self
    }

    /// Create a new key in a namespace
    pub async fn create(&self, params: NewKey, actor: Actor) -> Result<CreatedKey, DomainError> {
        if let Some(name) = &params.name {
            validate_key_name(name)?;
        }
        validate_ip_whitelist(&params.ip_whitelist)?;
        if let Some(rate_limit) = &params.rate_limit {
            validate_rate_limit(rate_limit)?;
        }
        if let Some(quota) = &params.quota {
            validate_quota(quota)?;
        }
        self.require_live_namespace(&params.namespace_id).await?;

        let generated = self.codec.generate()?;
        let id = KeyId::new();

        let mut record = KeyRecord::new(
            id,
            generated.fingerprint,
            generated.key_prefix,
            params.namespace_id,
        )
        .with_metadata(params.metadata)
        .with_ip_whitelist(params.ip_whitelist)
        .with_delete_protection(params.delete_protected);
        if let Some(name) = params.name {
            record = record.with_name(name);
        }
        if let Some(owner_id) = params.owner_id {
            record = record.with_owner_id(owner_id);
        }
        if let Some(rate_limit) = params.rate_limit.or(self.default_rate_limit) {
            record = record.with_rate_limit(rate_limit);
        }
        if let Some(quota) = params.quota {
            record = record.with_quota(quota);
        }
        if let Some(expires_at) = params.expires_at {
            record = record.with_expiration(expires_at);
        }

        let record = self.keys.create(record).await?;
        info!(key_id = %id, namespace_id = %record.namespace_id(), "key created");
        self.audit_mutation(&record, AuditAction::Create, Map::new(), &actor);

        Ok(CreatedKey {
            record,
            raw_key: generated.raw_key,
        })
    }

    pub async fn get(&self, id: &KeyId) -> Result<Option<KeyRecord>, DomainError> {
        self.keys.get(id).await
    }

    pub async fn list(
        &self,
        namespace: Option<&NamespaceId>,
    ) -> Result<Vec<KeyRecord>, DomainError> {
        self.keys.list(namespace).await
    }

    /// Apply a partial update to a key's configuration.
    ///
    /// Runtime counter state is untouched: tightening a rate limit or quota
    /// takes effect against whatever the key has already consumed.
    pub async fn update(
        &self,
        id: &KeyId,
        update: KeyUpdate,
        actor: Actor,
    ) -> Result<KeyRecord, DomainError> {
        if let Some(Some(name)) = &update.name {
            validate_key_name(name)?;
        }
        if let Some(whitelist) = &update.ip_whitelist {
            validate_ip_whitelist(whitelist)?;
        }
        if let Some(Some(rate_limit)) = &update.rate_limit {
            validate_rate_limit(rate_limit)?;
        }
        if let Some(Some(quota)) = &update.quota {
            validate_quota(quota)?;
        }

        let mut record = self.require_key(id).await?;
        let updated_fields = update.updated_fields();

        if let Some(name) = update.name {
            record.set_name(name);
        }
        if let Some(owner_id) = update.owner_id {
            record.set_owner_id(owner_id);
        }
        if let Some(metadata) = update.metadata {
            record.set_metadata(metadata);
        }
        if let Some(whitelist) = update.ip_whitelist {
            record.set_ip_whitelist(whitelist);
        }
        if let Some(rate_limit) = update.rate_limit {
            record.set_rate_limit(rate_limit);
        }
        if let Some(quota) = update.quota {
            record.set_quota(quota);
        }
        if let Some(expires_at) = update.expires_at {
            record.set_expiration(expires_at);
        }
        if let Some(protected) = update.delete_protected {
            record.set_delete_protection(protected);
        }

        let record = self.keys.update(&record).await?;
        info!(key_id = %id, fields = ?updated_fields, "key updated");

        let mut context = Map::new();
        context.insert(
            "updated_fields".to_string(),
            Value::Array(
                updated_fields
                    .into_iter()
                    .map(|field| Value::String(field.to_string()))
                    .collect(),
            ),
        );
        self.audit_mutation(&record, AuditAction::Update, context, &actor);

        Ok(record)
    }

    /// Revoke a key. Terminal and idempotent; verification denies from the
    /// very next attempt.
    pub async fn revoke(&self, id: &KeyId, actor: Actor) -> Result<KeyRecord, DomainError> {
        let mut record = self.require_key(id).await?;
        if record.is_revoked() {
            return Ok(record);
        }

        record.revoke(Utc::now());
        let record = self.keys.update(&record).await?;
        info!(key_id = %id, "key revoked");
        self.audit_mutation(&record, AuditAction::Revoke, Map::new(), &actor);

        Ok(record)
    }

    /// Rotate a key's credential material.
    ///
    /// The key id, metadata, whitelist and limit configuration are preserved;
    /// the fingerprint changes, the old raw key stops verifying, and quota
    /// accounting starts fresh. The rate window is deliberately untouched.
    pub async fn rotate(&self, id: &KeyId, actor: Actor) -> Result<CreatedKey, DomainError> {
        let mut record = self.require_key(id).await?;
        if record.is_revoked() {
            return Err(DomainError::conflict(format!(
                "Key '{id}' is revoked and cannot be rotated"
            )));
        }

        let generated = self.codec.generate()?;
        record.replace_credential(generated.fingerprint, generated.key_prefix);

        // Drop quota state before swapping the credential. If the swap then
        // fails the old key merely re-seeds its quota; the reverse order
        // could leave a live new credential carrying stale quota behind an
        // error the caller saw.
        self.quota.reset(id).await?;
        let record = self.keys.update(&record).await?;
        info!(key_id = %id, "key rotated");
        self.audit_mutation(&record, AuditAction::Rotate, Map::new(), &actor);

        Ok(CreatedKey {
            record,
            raw_key: generated.raw_key,
        })
    }

    /// Delete a key record. Blocked while `delete_protected` is set, unless
    /// `force` is passed.
    pub async fn delete(&self, id: &KeyId, force: bool, actor: Actor) -> Result<bool, DomainError> {
        let record = self.require_key(id).await?;
        if record.is_delete_protected() && !force {
            return Err(DomainError::conflict(format!(
                "Key '{id}' is delete-protected"
            )));
        }

        let deleted = self.keys.delete(id).await?;
        info!(key_id = %id, force, "key deleted");

        let mut context = Map::new();
        context.insert("forced".to_string(), Value::Bool(force));
        self.audit_mutation(&record, AuditAction::Delete, context, &actor);

        Ok(deleted)
    }

    // Namespaces

    pub async fn create_namespace(
        &self,
        name: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Result<Namespace, DomainError> {
        let namespace = self.namespaces.create(Namespace::new(name, owner_id)).await?;
        info!(namespace_id = %namespace.id(), "namespace created");
        Ok(namespace)
    }

    pub async fn get_namespace(&self, id: &NamespaceId) -> Result<Option<Namespace>, DomainError> {
        self.namespaces.get(id).await
    }

    pub async fn list_namespaces(&self) -> Result<Vec<Namespace>, DomainError> {
        self.namespaces.list().await
    }

    pub async fn delete_namespace(&self, id: &NamespaceId) -> Result<bool, DomainError> {
        let deleted = self.namespaces.soft_delete(id).await?;
        if deleted {
            info!(namespace_id = %id, "namespace deleted");
        }
        Ok(deleted)
    }

    async fn require_key(&self, id: &KeyId) -> Result<KeyRecord, DomainError> {
        self.keys
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Key '{id}' not found")))
    }

    async fn require_live_namespace(&self, id: &NamespaceId) -> Result<(), DomainError> {
        let namespace = self
            .namespaces
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Namespace '{id}' not found")))?;
        if namespace.is_deleted() {
            return Err(DomainError::conflict(format!("Namespace '{id}' is deleted")));
        }
        Ok(())
    }

    fn audit_mutation(
        &self,
        record: &KeyRecord,
        action: AuditAction,
        context: Map<String, Value>,
        actor: &Actor,
    ) {
        let mut event = AuditEvent::new(action, AuditOutcome::Allow)
            .with_key(*record.id(), *record.namespace_id());
        if let Some(ip) = &actor.ip {
            event = event.with_ip_address(ip.clone());
        }
        if let Some(user_agent) = &actor.user_agent {
            event = event.with_user_agent(user_agent.clone());
        }
        for (name, value) in context {
            event = event.with_context_entry(name, value);
        }
        self.audit.record(event);
    }
}
