//! Key record entity and policy configuration types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::namespace::NamespaceId;

/// Public, non-secret key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(Uuid);

impl KeyId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for KeyId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sliding-window rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests admitted within the window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }
}

/// Scheduled quota refill configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefillConfig {
    /// Seconds between refills
    pub interval_secs: u64,
    /// Uses added per refill. Missed intervals do not stack; the refill is
    /// capped at the originally configured quota.
    pub amount: i64,
}

/// Total-use quota configuration. Absent quota means unlimited use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Originally configured number of uses; also the refill cap
    pub max_uses: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refill: Option<RefillConfig>,
}

impl QuotaConfig {
    pub fn new(max_uses: i64) -> Self {
        Self {
            max_uses,
            refill: None,
        }
    }

    pub fn with_refill(mut self, interval_secs: u64, amount: i64) -> Self {
        self.refill = Some(RefillConfig {
            interval_secs,
            amount,
        });
        self
    }
}

/// Durable key record.
///
/// The raw key exists only at creation/rotation response time; the record
/// stores the keyed-hash fingerprint and a short display prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    id: KeyId,
    /// Unique, non-reversible lookup fingerprint (HMAC of the raw key)
    fingerprint: String,
    /// Display prefix for identification, e.g. "sk_live_ab12cd34..."
    key_prefix: String,
    namespace_id: NamespaceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    /// Opaque external owner identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    owner_id: Option<String>,
    /// Arbitrary key-value payload, opaque to the engine
    #[serde(default)]
    metadata: Map<String, Value>,
    /// IP/CIDR allow-list; empty means unrestricted
    #[serde(default)]
    ip_whitelist: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit: Option<RateLimitConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quota: Option<QuotaConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    revoked_at: Option<DateTime<Utc>>,
    delete_protected: bool,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_verified_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    pub fn new(
        id: KeyId,
        fingerprint: impl Into<String>,
        key_prefix: impl Into<String>,
        namespace_id: NamespaceId,
    ) -> Self {
        Self {
            id,
            fingerprint: fingerprint.into(),
            key_prefix: key_prefix.into(),
            namespace_id,
            name: None,
            owner_id: None,
            metadata: Map::new(),
            ip_whitelist: Vec::new(),
            rate_limit: None,
            quota: None,
            expires_at: None,
            revoked: false,
            revoked_at: None,
            delete_protected: false,
            created_at: Utc::now(),
            last_verified_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_owner_id(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_ip_whitelist(mut self, whitelist: Vec<String>) -> Self {
        self.ip_whitelist = whitelist;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn with_quota(mut self, quota: QuotaConfig) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_delete_protection(mut self, protected: bool) -> Self {
        self.delete_protected = protected;
        self
    }

    // Getters

    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn namespace_id(&self) -> &NamespaceId {
        &self.namespace_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn ip_whitelist(&self) -> &[String] {
        &self.ip_whitelist
    }

    pub fn rate_limit(&self) -> Option<&RateLimitConfig> {
        self.rate_limit.as_ref()
    }

    pub fn quota(&self) -> Option<&QuotaConfig> {
        self.quota.as_ref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    pub fn is_delete_protected(&self) -> bool {
        self.delete_protected
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_verified_at(&self) -> Option<DateTime<Utc>> {
        self.last_verified_at
    }

    // Status checks

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    // Mutators

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn set_owner_id(&mut self, owner_id: Option<String>) {
        self.owner_id = owner_id;
    }

    pub fn set_metadata(&mut self, metadata: Map<String, Value>) {
        self.metadata = metadata;
    }

    pub fn set_ip_whitelist(&mut self, whitelist: Vec<String>) {
        self.ip_whitelist = whitelist;
    }

    pub fn set_rate_limit(&mut self, rate_limit: Option<RateLimitConfig>) {
        self.rate_limit = rate_limit;
    }

    pub fn set_quota(&mut self, quota: Option<QuotaConfig>) {
        self.quota = quota;
    }

    pub fn set_expiration(&mut self, expires_at: Option<DateTime<Utc>>) {
        self.expires_at = expires_at;
    }

    pub fn set_delete_protection(&mut self, protected: bool) {
        self.delete_protected = protected;
    }

    /// Revoke the key. Terminal; there is no way back to a usable state.
    pub fn revoke(&mut self, now: DateTime<Utc>) {
        self.revoked = true;
        self.revoked_at = Some(now);
    }

    /// Replace the credential material during rotation. The id, metadata and
    /// limit configuration stay untouched.
    pub fn replace_credential(
        &mut self,
        fingerprint: impl Into<String>,
        key_prefix: impl Into<String>,
    ) {
        self.fingerprint = fingerprint.into();
        self.key_prefix = key_prefix.into();
    }

    pub fn mark_verified(&mut self, at: DateTime<Utc>) {
        self.last_verified_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_record() -> KeyRecord {
        KeyRecord::new(
            KeyId::new(),
            "fp-abc",
            "sk_test_ab12cd34...",
            NamespaceId::new(),
        )
    }

    #[test]
    fn test_record_defaults() {
        let record = test_record();

        assert!(!record.is_revoked());
        assert!(!record.is_delete_protected());
        assert!(record.ip_whitelist().is_empty());
        assert!(record.rate_limit().is_none());
        assert!(record.quota().is_none());
        assert!(record.last_verified_at().is_none());
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let record = test_record().with_expiration(now);

        // Closed at the boundary: now >= expires_at denies
        assert!(record.is_expired_at(now));
        assert!(record.is_expired_at(now + Duration::seconds(1)));
        assert!(!record.is_expired_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_no_expiry_never_expires() {
        let record = test_record();
        assert!(!record.is_expired_at(Utc::now() + Duration::days(10_000)));
    }

    #[test]
    fn test_revoke_is_terminal() {
        let mut record = test_record();
        let now = Utc::now();

        record.revoke(now);

        assert!(record.is_revoked());
        assert_eq!(record.revoked_at(), Some(now));
    }

    #[test]
    fn test_rotation_preserves_identity_and_limits() {
        let mut record = test_record()
            .with_quota(QuotaConfig::new(10).with_refill(60, 5))
            .with_rate_limit(RateLimitConfig::new(100, 60));
        let id = *record.id();

        record.replace_credential("fp-new", "sk_test_ef56gh78...");

        assert_eq!(record.id(), &id);
        assert_eq!(record.fingerprint(), "fp-new");
        assert_eq!(record.key_prefix(), "sk_test_ef56gh78...");
        assert_eq!(record.quota().unwrap().max_uses, 10);
        assert_eq!(record.rate_limit().unwrap().max_requests, 100);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let mut metadata = Map::new();
        metadata.insert("plan".to_string(), Value::String("pro".to_string()));
        let record = test_record().with_metadata(metadata);

        let json = serde_json::to_string(&record).unwrap();
        let parsed: KeyRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.metadata()["plan"], Value::String("pro".to_string()));
        assert_eq!(parsed.fingerprint(), record.fingerprint());
    }
}
