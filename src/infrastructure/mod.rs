//! Infrastructure layer - Engine component implementations

pub mod audit;
pub mod codec;
pub mod counter;
pub mod key;
pub mod logging;
pub mod namespace;
pub mod quota;
pub mod rate_limiter;
pub mod service;
pub mod verifier;

pub use audit::{AuditRecorder, InMemoryAuditStore};
pub use codec::{CredentialCodec, GeneratedKey};
pub use counter::InMemoryCounterStore;
pub use key::{CachedKeyRepository, InMemoryKeyRepository};
pub use namespace::InMemoryNamespaceRepository;
pub use quota::{QuotaDecision, QuotaTracker};
pub use rate_limiter::{RateLimitDecision, SlidingWindowLimiter};
pub use service::{Actor, CreatedKey, KeyService, KeyUpdate, NewKey};
pub use verifier::Verifier;
