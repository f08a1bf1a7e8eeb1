//! API namespace domain

mod entity;
mod repository;

pub use entity::{Namespace, NamespaceId};
pub use repository::NamespaceRepository;
