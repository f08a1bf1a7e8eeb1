//! Audit recording infrastructure

mod in_memory;
mod recorder;

pub use in_memory::InMemoryAuditStore;
pub use recorder::AuditRecorder;
