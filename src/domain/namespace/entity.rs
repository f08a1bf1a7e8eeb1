//! API namespace entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceId(Uuid);

impl NamespaceId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for NamespaceId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// API namespace grouping keys for one protected API.
///
/// Immutable once keys reference it, except for soft-delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    id: NamespaceId,
    name: String,
    /// Opaque reference to the administrator who owns the namespace
    owner_id: String,
    deleted: bool,
    created_at: DateTime<Utc>,
}

impl Namespace {
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: NamespaceId::new(),
            name: name.into(),
            owner_id: owner_id.into(),
            deleted: false,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &NamespaceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn soft_delete(&mut self) {
        self.deleted = true;
    }
}
