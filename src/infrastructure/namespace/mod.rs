//! Namespace storage infrastructure

mod repository;

pub use repository::InMemoryNamespaceRepository;
