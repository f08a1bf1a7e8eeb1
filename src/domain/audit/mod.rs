//! Audit domain

mod event;
mod repository;

pub use event::{AuditAction, AuditEvent, AuditOutcome};
pub use repository::AuditStore;
