//! Shared counter store contract
//!
//! The rate limiter and quota tracker both sit on top of a fast counter
//! store with atomic mutations and per-entry expiry. The only per-key
//! atomicity the engine needs lives here: bucket increments, the
//! check-and-decrement of quota consumption, and the compare-and-swap loop
//! used by quota refill. A Redis backend maps these onto INCRBY/MGET and
//! small scripts; the in-memory backend holds a single lock per operation.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Result of an atomic quota decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecrement {
    /// The counter was positive and has been decremented
    Applied { remaining: i64 },
    /// The counter was zero or negative; nothing was decremented
    Exhausted,
    /// No counter exists under this key
    Missing,
}

#[async_trait]
pub trait CounterStore: Send + Sync + Debug {
    /// Atomically add `delta` to the counter, creating it at zero if absent,
    /// and return the new value. A TTL, when given, is applied to newly
    /// created entries.
    async fn increment_by(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, DomainError>;

    /// Read a single counter. Expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<i64>, DomainError>;

    /// Read several counters in one round trip.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<i64>>, DomainError>;

    /// Create the counter with `value` only if it does not already exist.
    /// Returns true when the value was written.
    async fn set_if_absent(
        &self,
        key: &str,
        value: i64,
        ttl: Option<Duration>,
    ) -> Result<bool, DomainError>;

    /// Atomically replace `expected` with `new`. Returns true on success,
    /// false when the current value differs (including absent).
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: i64,
        new: i64,
    ) -> Result<bool, DomainError>;

    /// Atomically decrement the counter by one if it is positive.
    async fn decrement_if_positive(&self, key: &str) -> Result<QuotaDecrement, DomainError>;

    /// Remove a counter entirely.
    async fn remove(&self, key: &str) -> Result<(), DomainError>;
}
