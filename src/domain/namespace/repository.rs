//! Namespace repository trait

use std::fmt::Debug;

use async_trait::async_trait;

use super::entity::{Namespace, NamespaceId};
use crate::domain::DomainError;

#[async_trait]
pub trait NamespaceRepository: Send + Sync + Debug {
    async fn get(&self, id: &NamespaceId) -> Result<Option<Namespace>, DomainError>;

    async fn create(&self, namespace: Namespace) -> Result<Namespace, DomainError>;

    async fn list(&self) -> Result<Vec<Namespace>, DomainError>;

    /// Soft-delete the namespace. Returns true when something was marked.
    async fn soft_delete(&self, id: &NamespaceId) -> Result<bool, DomainError>;
}
