//! Quota tracker
//!
//! Total-use accounting with optional scheduled refill. Quota state is
//! created lazily in the counter store on first verification and mutated
//! only through atomic store operations: refill claims go through a
//! compare-and-swap on the last-refill timestamp, consumption through an
//! atomic check-and-decrement. Two concurrent verifications at remaining=1
//! therefore produce exactly one allow.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::counter::{CounterStore, QuotaDecrement};
use crate::domain::key::{KeyId, QuotaConfig};
use crate::domain::DomainError;

/// Bound on the replenish compare-and-swap loop. Contention comes only from
/// concurrent decrements, so a handful of retries always suffices.
const MAX_REFILL_ATTEMPTS: u32 = 8;

/// Result of a quota consumption attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    /// Uses left after this attempt; None when the key has unlimited quota
    pub remaining: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct QuotaTracker {
    store: Arc<dyn CounterStore>,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Apply any due refill, then consume one use.
    ///
    /// Keys without a quota config are always allowed and create no state.
    /// Refill adds at most one increment per evaluation regardless of how
    /// many intervals have elapsed, capped at the configured quota.
    pub async fn consume_one(
        &self,
        key_id: &KeyId,
        config: Option<&QuotaConfig>,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, DomainError> {
        let config = match config {
            Some(config) => config,
            None => {
                return Ok(QuotaDecision {
                    allowed: true,
                    remaining: None,
                })
            }
        };

        let remaining_key = remaining_key(key_id);
        let refill_key = refill_key(key_id);
        let now_ts = now.timestamp();

        self.store
            .set_if_absent(&remaining_key, config.max_uses, None)
            .await?;
        self.store.set_if_absent(&refill_key, now_ts, None).await?;

        if let Some(refill) = &config.refill {
            let last_refill = self
                .store
                .get(&refill_key)
                .await?
                .unwrap_or(now_ts);

            if now_ts.saturating_sub(last_refill) >= refill.interval_secs as i64 {
                // Claim the refill; losing the race means another caller
                // already applied it for this interval.
                let claimed = self
                    .store
                    .compare_and_swap(&refill_key, last_refill, now_ts)
                    .await?;
                if claimed {
                    self.replenish(&remaining_key, refill.amount, config.max_uses)
                        .await?;
                }
            }
        }

        match self.store.decrement_if_positive(&remaining_key).await? {
            QuotaDecrement::Applied { remaining } => Ok(QuotaDecision {
                allowed: true,
                remaining: Some(remaining),
            }),
            QuotaDecrement::Exhausted => Ok(QuotaDecision {
                allowed: false,
                remaining: Some(0),
            }),
            QuotaDecrement::Missing => {
                // The state was dropped between init and consume (rotation
                // racing a verification). Re-seed and try once more.
                self.store
                    .set_if_absent(&remaining_key, config.max_uses, None)
                    .await?;
                match self.store.decrement_if_positive(&remaining_key).await? {
                    QuotaDecrement::Applied { remaining } => Ok(QuotaDecision {
                        allowed: true,
                        remaining: Some(remaining),
                    }),
                    _ => Ok(QuotaDecision {
                        allowed: false,
                        remaining: Some(0),
                    }),
                }
            }
        }
    }

    /// Drop all quota state for a key so the next verification re-seeds it
    /// from the record's configuration. Used by rotation.
    pub async fn reset(&self, key_id: &KeyId) -> Result<(), DomainError> {
        self.store.remove(&remaining_key(key_id)).await?;
        self.store.remove(&refill_key(key_id)).await?;
        Ok(())
    }

    async fn replenish(
        &self,
        remaining_key: &str,
        amount: i64,
        cap: i64,
    ) -> Result<(), DomainError> {
        for _ in 0..MAX_REFILL_ATTEMPTS {
            let current = self.store.get(remaining_key).await?.unwrap_or(0);
            let replenished = current.saturating_add(amount).min(cap);

            if replenished == current {
                return Ok(());
            }
            if self
                .store
                .compare_and_swap(remaining_key, current, replenished)
                .await?
            {
                return Ok(());
            }
        }

        warn!(key = remaining_key, "quota refill lost CAS race repeatedly, skipping");
        Ok(())
    }
}

fn remaining_key(key_id: &KeyId) -> String {
    format!("quota:{key_id}:remaining")
}

fn refill_key(key_id: &KeyId) -> String {
    format!("quota:{key_id}:last_refill")
}
