//! Verification outcome types
//!
//! The verification pipeline threads a tagged result through its ordered
//! checks; every exit path is explicit.

use serde::{Deserialize, Serialize};

use crate::domain::key::KeyId;

/// Reason a verification was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    /// No key record matches the presented credential
    KeyNotFound,
    /// The key has been revoked (terminal)
    KeyRevoked,
    /// The key's expiration timestamp has passed
    KeyExpired,
    /// The caller's IP does not match the key's whitelist
    IpNotAllowed,
    /// The sliding-window rate limit was exceeded
    RateLimited,
    /// The key has no remaining uses
    QuotaExceeded,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyNotFound => "KEY_NOT_FOUND",
            Self::KeyRevoked => "KEY_REVOKED",
            Self::KeyExpired => "KEY_EXPIRED",
            Self::IpNotAllowed => "IP_NOT_ALLOWED",
            Self::RateLimited => "RATE_LIMITED",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
        }
    }

    /// Whether the caller may retry after backoff.
    ///
    /// Identity failures (not found, revoked, expired) are permanent until an
    /// admin mutation changes state. IP restrictions require a configuration
    /// change, not a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::QuotaExceeded)
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Behavior when the counter store is unavailable mid-verification.
///
/// Fail-closed turns the infrastructure failure into an error the transport
/// maps to a 5xx; fail-open admits the request without rate/quota
/// accounting. Lookup failures always surface as errors: there is no record
/// to admit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    FailClosed,
    FailOpen,
}

/// Decision produced by the verification pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The credential is valid and the request was admitted
    Allowed {
        key_id: KeyId,
        owner_id: Option<String>,
        /// Remaining quota after this use (None = unlimited)
        remaining: Option<i64>,
        /// Remaining requests in the current rate window (None = no limit)
        rate_remaining: Option<i64>,
    },
    /// The request was denied
    Denied { reason: DenyReason },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::Allowed { .. } => None,
            Self::Denied { reason } => Some(*reason),
        }
    }
}

/// Conceptual verification request: the presented credential plus caller
/// context (IP for the whitelist check, user agent for the audit trail)
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    pub key: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl VerifyRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ip: None,
            user_agent: None,
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Wire-level verification response. Never echoes the presented key.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<KeyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DenyReason>,
}

impl From<Verdict> for VerifyResponse {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Allowed {
                key_id,
                owner_id,
                remaining,
                rate_remaining,
            } => Self {
                valid: true,
                key_id: Some(key_id),
                owner_id,
                remaining,
                rate_remaining,
                error: None,
            },
            Verdict::Denied { reason } => Self {
                valid: false,
                key_id: None,
                owner_id: None,
                remaining: None,
                rate_remaining: None,
                error: Some(reason),
            },
        }
    }
}
