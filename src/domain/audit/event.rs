//! Audit event entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::key::KeyId;
use crate::domain::namespace::NamespaceId;
use crate::domain::verification::DenyReason;

/// Kind of action the event records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Verify,
    Update,
    Rotate,
    Revoke,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Verify => "verify",
            Self::Update => "update",
            Self::Rotate => "rotate",
            Self::Revoke => "revoke",
            Self::Delete => "delete",
        }
    }
}

/// ALLOW/DENY outcome with the first failing reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum AuditOutcome {
    Allow,
    Deny(DenyReason),
}

impl AuditOutcome {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::Allow => None,
            Self::Deny(reason) => Some(*reason),
        }
    }
}

/// Immutable record of one verification attempt or admin mutation.
///
/// Key id and namespace id are absent only for attempts against credentials
/// that resolve to no record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_id: Option<KeyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace_id: Option<NamespaceId>,
    action: AuditAction,
    #[serde(flatten)]
    outcome: AuditOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<String>,
    #[serde(default)]
    context: Map<String, Value>,
    created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, outcome: AuditOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            key_id: None,
            namespace_id: None,
            action,
            outcome,
            ip_address: None,
            user_agent: None,
            context: Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_key(mut self, key_id: KeyId, namespace_id: NamespaceId) -> Self {
        self.key_id = Some(key_id);
        self.namespace_id = Some(namespace_id);
        self
    }

    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_context_entry(mut self, name: impl Into<String>, value: Value) -> Self {
        self.context.insert(name.into(), value);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key_id(&self) -> Option<&KeyId> {
        self.key_id.as_ref()
    }

    pub fn namespace_id(&self) -> Option<&NamespaceId> {
        self.namespace_id.as_ref()
    }

    pub fn action(&self) -> AuditAction {
        self.action
    }

    pub fn outcome(&self) -> AuditOutcome {
        self.outcome
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_deny_event() {
        let key_id = KeyId::new();
        let namespace_id = NamespaceId::new();

        let event = AuditEvent::new(
            AuditAction::Verify,
            AuditOutcome::Deny(DenyReason::RateLimited),
        )
        .with_key(key_id, namespace_id)
        .with_ip_address("10.0.0.9");

        assert_eq!(event.action(), AuditAction::Verify);
        assert_eq!(event.outcome().deny_reason(), Some(DenyReason::RateLimited));
        assert_eq!(event.key_id(), Some(&key_id));
        assert_eq!(event.ip_address(), Some("10.0.0.9"));
    }

    #[test]
    fn test_event_serialization() {
        let event = AuditEvent::new(AuditAction::Revoke, AuditOutcome::Allow)
            .with_context_entry("forced", Value::Bool(false));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "revoke");
        assert_eq!(json["outcome"], "allow");
        assert_eq!(json["context"]["forced"], false);
    }
}
