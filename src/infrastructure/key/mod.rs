//! Key record storage infrastructure

mod cached;
mod repository;

pub use cached::CachedKeyRepository;
pub use repository::InMemoryKeyRepository;
