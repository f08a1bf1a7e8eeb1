//! Verification pipeline
//!
//! One atomic ALLOW/DENY decision per presented credential, short-circuiting
//! on the first failing check in a fixed order: lookup, revocation, expiry,
//! IP filter, rate limit, quota. Identity and configuration failures never
//! touch rate or quota state; a rate-limit denial does not consume quota.
//! Every attempt leaves exactly one audit event on its way out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::domain::access::is_ip_allowed;
use crate::domain::audit::{AuditAction, AuditEvent, AuditOutcome};
use crate::domain::counter::CounterStore;
use crate::domain::key::{KeyRecord, KeyRecordRepository};
use crate::domain::verification::{DenyReason, FailurePolicy, Verdict, VerifyRequest};
use crate::domain::DomainError;
use crate::infrastructure::audit::AuditRecorder;
use crate::infrastructure::codec::CredentialCodec;
use crate::infrastructure::quota::{QuotaDecision, QuotaTracker};
use crate::infrastructure::rate_limiter::SlidingWindowLimiter;

pub struct Verifier {
    codec: CredentialCodec,
    repository: Arc<dyn KeyRecordRepository>,
    rate_limiter: SlidingWindowLimiter,
    quota: QuotaTracker,
    audit: AuditRecorder,
    failure_policy: FailurePolicy,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("failure_policy", &self.failure_policy)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    pub fn new(
        codec: CredentialCodec,
        repository: Arc<dyn KeyRecordRepository>,
        counters: Arc<dyn CounterStore>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            codec,
            repository,
            rate_limiter: SlidingWindowLimiter::new(Arc::clone(&counters)),
            quota: QuotaTracker::new(counters),
            audit,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Verify a presented credential against the current clock.
    pub async fn verify(&self, request: &VerifyRequest) -> Result<Verdict, DomainError> {
        self.verify_at(request, Utc::now()).await
    }

    /// Verify a presented credential at an explicit instant.
    pub async fn verify_at(
        &self,
        request: &VerifyRequest,
        now: DateTime<Utc>,
    ) -> Result<Verdict, DomainError> {
        let fingerprint = self.codec.fingerprint(&request.key)?;

        let record = self
            .repository
            .find_by_fingerprint(&fingerprint)
            .await
            .map_err(|err| {
                error!("key record lookup failed: {err}");
                DomainError::unavailable("key record store unavailable")
            })?;

        let Some(record) = record else {
            debug!("verification failed: no record for presented credential");
            self.audit_verify(None, request, AuditOutcome::Deny(DenyReason::KeyNotFound));
            return Ok(Verdict::Denied {
                reason: DenyReason::KeyNotFound,
            });
        };

        let verdict = self.decide(&record, request, now).await?;
        let outcome = match verdict.deny_reason() {
            Some(reason) => {
                debug!(key_id = %record.id(), %reason, "verification denied");
                AuditOutcome::Deny(reason)
            }
            None => AuditOutcome::Allow,
        };
        self.audit_verify(Some(&record), request, outcome);

        Ok(verdict)
    }

    async fn decide(
        &self,
        record: &KeyRecord,
        request: &VerifyRequest,
        now: DateTime<Utc>,
    ) -> Result<Verdict, DomainError> {
        if record.is_revoked() {
            return Ok(denied(DenyReason::KeyRevoked));
        }
        if record.is_expired_at(now) {
            return Ok(denied(DenyReason::KeyExpired));
        }
        if !is_ip_allowed(record.ip_whitelist(), request.ip.as_deref()) {
            return Ok(denied(DenyReason::IpNotAllowed));
        }

        // From here on the attempt consumes capacity: the rate window counts
        // it even when denied, and quota is consumed only once rate passes.
        let mut rate_remaining = None;
        if let Some(config) = record.rate_limit() {
            match self
                .rate_limiter
                .check_and_increment(record.id(), config, now)
                .await
            {
                Ok(decision) if !decision.allowed => {
                    return Ok(denied(DenyReason::RateLimited));
                }
                Ok(decision) => rate_remaining = Some(decision.remaining),
                Err(err) => match self.failure_policy {
                    FailurePolicy::FailOpen => {
                        warn!(key_id = %record.id(), "counter store down, admitting without rate check: {err}");
                    }
                    FailurePolicy::FailClosed => {
                        error!(key_id = %record.id(), "counter store down, failing closed: {err}");
                        return Err(DomainError::unavailable("counter store unavailable"));
                    }
                },
            }
        }

        let quota_decision = match self.quota.consume_one(record.id(), record.quota(), now).await
        {
            Ok(decision) => decision,
            Err(err) => match self.failure_policy {
                FailurePolicy::FailOpen => {
                    warn!(key_id = %record.id(), "counter store down, admitting without quota check: {err}");
                    QuotaDecision {
                        allowed: true,
                        remaining: None,
                    }
                }
                FailurePolicy::FailClosed => {
                    error!(key_id = %record.id(), "counter store down, failing closed: {err}");
                    return Err(DomainError::unavailable("counter store unavailable"));
                }
            },
        };
        if !quota_decision.allowed {
            return Ok(denied(DenyReason::QuotaExceeded));
        }

        if let Err(err) = self.repository.update_last_verified(record.id(), now).await {
            warn!(key_id = %record.id(), "failed to stamp last verification: {err}");
        }

        Ok(Verdict::Allowed {
            key_id: *record.id(),
            owner_id: record.owner_id().map(String::from),
            remaining: quota_decision.remaining,
            rate_remaining,
        })
    }

    fn audit_verify(
        &self,
        record: Option<&KeyRecord>,
        request: &VerifyRequest,
        outcome: AuditOutcome,
    ) {
        let mut event = AuditEvent::new(AuditAction::Verify, outcome);
        if let Some(record) = record {
            event = event.with_key(*record.id(), *record.namespace_id());
        }
        if let Some(ip) = &request.ip {
            event = event.with_ip_address(ip.clone());
        }
        if let Some(user_agent) = &request.user_agent {
            event = event.with_user_agent(user_agent.clone());
        }
        self.audit.record(event);
    }

    /// Waits for queued audit events to land. Test hook.
    #[cfg(test)]
    pub(crate) async fn flush_audit(&self) {
        self.audit.flush().await;
    }
}

fn denied(reason: DenyReason) -> Verdict {
    Verdict::Denied { reason }
}
