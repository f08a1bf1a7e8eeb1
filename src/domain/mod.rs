//! Domain layer - Core entities, policy logic and store contracts

pub mod access;
pub mod audit;
pub mod counter;
pub mod error;
pub mod key;
pub mod namespace;
pub mod verification;

pub use audit::{AuditAction, AuditEvent, AuditOutcome, AuditStore};
pub use counter::{CounterStore, QuotaDecrement};
pub use error::DomainError;
pub use key::{
    KeyId, KeyRecord, KeyRecordRepository, QuotaConfig, RateLimitConfig, RefillConfig,
};
pub use namespace::{Namespace, NamespaceId, NamespaceRepository};
pub use verification::{DenyReason, FailurePolicy, Verdict, VerifyRequest, VerifyResponse};
