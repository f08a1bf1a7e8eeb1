//! Sliding-window rate limiter
//!
//! Request counts live in fixed sub-interval buckets inside the shared
//! counter store, each with its own expiry; the active window count is the
//! sum of live buckets whose start time falls within `[now - window, now]`.
//! Buckets outside the window fall out through the store's expiry, no sweep
//! needed. A denied attempt still counts against the window: the increment
//! is never rolled back.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::counter::CounterStore;
use crate::domain::key::{KeyId, RateLimitConfig};
use crate::domain::DomainError;

/// Number of sub-interval buckets a window is divided into.
const BUCKETS_PER_WINDOW: u64 = 60;

/// Result of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the window after this attempt
    pub remaining: i64,
    pub limit: u32,
    /// When the window will have fully turned over
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter {
    store: Arc<dyn CounterStore>,
}

impl SlidingWindowLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Atomically count this attempt and decide whether it is admitted.
    ///
    /// The attempt that brings the windowed sum to exactly `max_requests` is
    /// allowed; the next one is denied.
    pub async fn check_and_increment(
        &self,
        key_id: &KeyId,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, DomainError> {
        let window = config.window_secs.max(1);
        let bucket_len = (window / BUCKETS_PER_WINDOW).max(1);
        let now_ts = now.timestamp();
        let bucket_start = now_ts - now_ts.rem_euclid(bucket_len as i64);

        // Buckets get a TTL one sub-interval past the window so a bucket at
        // the trailing edge is still readable until it can no longer matter.
        let ttl = Duration::from_secs(window + bucket_len);
        let current_key = bucket_key(key_id, bucket_start);
        self.store.increment_by(&current_key, 1, Some(ttl)).await?;

        let lower = now_ts - window as i64;
        let mut keys = Vec::new();
        let mut start = bucket_start;
        while start >= lower {
            keys.push(bucket_key(key_id, start));
            start -= bucket_len as i64;
        }

        let windowed_sum: i64 = self
            .store
            .multi_get(&keys)
            .await?
            .into_iter()
            .flatten()
            .sum();

        let limit = config.max_requests as i64;
        Ok(RateLimitDecision {
            allowed: windowed_sum <= limit,
            remaining: (limit - windowed_sum).max(0),
            limit: config.max_requests,
            reset_at: now + chrono::Duration::seconds(window as i64),
        })
    }
}

fn bucket_key(key_id: &KeyId, bucket_start: i64) -> String {
    format!("rl:{key_id}:{bucket_start}")
}
