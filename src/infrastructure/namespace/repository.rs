//! In-memory namespace repository

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::namespace::{Namespace, NamespaceId, NamespaceRepository};
use crate::domain::DomainError;

#[derive(Debug, Default)]
pub struct InMemoryNamespaceRepository {
    namespaces: RwLock<HashMap<Uuid, Namespace>>,
}

impl InMemoryNamespaceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NamespaceRepository for InMemoryNamespaceRepository {
    async fn get(&self, id: &NamespaceId) -> Result<Option<Namespace>, DomainError> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(&id.as_uuid()).cloned())
    }

    async fn create(&self, namespace: Namespace) -> Result<Namespace, DomainError> {
        let mut namespaces = self.namespaces.write().await;

        if namespaces.contains_key(&namespace.id().as_uuid()) {
            return Err(DomainError::conflict(format!(
                "namespace '{}' already exists",
                namespace.id()
            )));
        }

        namespaces.insert(namespace.id().as_uuid(), namespace.clone());
        Ok(namespace)
    }

    async fn list(&self) -> Result<Vec<Namespace>, DomainError> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.values().cloned().collect())
    }

    async fn soft_delete(&self, id: &NamespaceId) -> Result<bool, DomainError> {
        let mut namespaces = self.namespaces.write().await;
        match namespaces.get_mut(&id.as_uuid()) {
            Some(namespace) => {
                namespace.soft_delete();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get_and_soft_delete() {
        let repo = InMemoryNamespaceRepository::new();
        let namespace = Namespace::new("payments-api", "admin-1");
        let id = *namespace.id();

        repo.create(namespace).await.unwrap();
        assert!(repo.get(&id).await.unwrap().is_some());

        assert!(repo.soft_delete(&id).await.unwrap());
        assert!(repo.get(&id).await.unwrap().unwrap().is_deleted());
        assert!(!repo.soft_delete(&NamespaceId::new()).await.unwrap());
    }
}
