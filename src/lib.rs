//! Keygate
//!
//! An API key verification and enforcement engine:
//! - Opaque credential issuance with one-time raw key exposure
//! - Keyed-hash fingerprints; raw keys are never stored
//! - Sliding-window rate limits and refillable usage quotas
//! - IP/CIDR restrictions, expiration, terminal revocation
//! - Append-only audit trail of every attempt and mutation

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    DenyReason, DomainError, KeyId, KeyRecord, NamespaceId, QuotaConfig, RateLimitConfig,
    Verdict, VerifyRequest, VerifyResponse,
};
pub use infrastructure::{Actor, CreatedKey, KeyService, KeyUpdate, NewKey, Verifier};

use std::sync::Arc;
use std::time::Duration;

use domain::audit::AuditStore;
use domain::counter::CounterStore;
use domain::key::KeyRecordRepository;
use domain::namespace::NamespaceRepository;
use infrastructure::audit::{AuditRecorder, InMemoryAuditStore};
use infrastructure::codec::CredentialCodec;
use infrastructure::counter::InMemoryCounterStore;
use infrastructure::key::{CachedKeyRepository, InMemoryKeyRepository};
use infrastructure::namespace::InMemoryNamespaceRepository;

/// A fully wired engine over in-memory stores
pub struct Engine {
    pub service: KeyService,
    pub verifier: Verifier,
    pub audit: AuditRecorder,
}

/// Wire an engine with default configuration. See [`build_engine_with_config`].
pub fn build_engine() -> Engine {
    build_engine_with_config(&AppConfig::default())
}

/// Wire an engine from configuration, backed by in-memory stores.
///
/// Spawns the audit worker, so this must be called within a Tokio runtime.
pub fn build_engine_with_config(config: &AppConfig) -> Engine {
    build_engine_with_stores(config, Arc::new(InMemoryAuditStore::new()))
}

/// Wire an engine with a caller-provided audit store.
pub fn build_engine_with_stores(config: &AppConfig, audit_store: Arc<dyn AuditStore>) -> Engine {
    let codec = CredentialCodec::new(config.engine.secret.as_bytes(), &config.engine.key_prefix);
    let keys: Arc<dyn KeyRecordRepository> = Arc::new(CachedKeyRepository::new(
        InMemoryKeyRepository::new(),
        Duration::from_secs(config.engine.cache_ttl_secs),
    ));
    let namespaces: Arc<dyn NamespaceRepository> = Arc::new(InMemoryNamespaceRepository::new());
    let counters: Arc<dyn CounterStore> = Arc::new(InMemoryCounterStore::new());
    let audit = AuditRecorder::spawn(audit_store);

    let service = KeyService::new(
        codec.clone(),
        Arc::clone(&keys),
        namespaces,
        Arc::clone(&counters),
        audit.clone(),
    )
    .with_default_rate_limit(Some(RateLimitConfig::new(
        config.engine.default_rate_limit,
        config.engine.default_rate_limit_window_secs,
    )));

    let verifier = Verifier::new(codec, keys, counters, audit.clone())
        .with_failure_policy(config.engine.failure_policy);

    Engine {
        service,
        verifier,
        audit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_engine_issue_and_verify() {
        let engine = build_engine();

        let namespace = engine
            .service
            .create_namespace("smoke", "admin")
            .await
            .unwrap();
        let created = engine
            .service
            .create(NewKey::in_namespace(*namespace.id()), Actor::default())
            .await
            .unwrap();

        assert!(created.raw_key.starts_with("sk_live_"));
        // Default rate limit lands on keys created without one
        assert_eq!(
            created.record.rate_limit(),
            Some(&RateLimitConfig::new(1000, 3600))
        );

        let verdict = engine
            .verifier
            .verify(&VerifyRequest::new(created.raw_key))
            .await
            .unwrap();
        assert!(verdict.is_allowed());

        let verdict = engine
            .verifier
            .verify(&VerifyRequest::new("sk_live_nope"))
            .await
            .unwrap();
        assert_eq!(verdict.deny_reason(), Some(DenyReason::KeyNotFound));
    }
}
