//! Counter store implementations

mod in_memory;

pub use in_memory::InMemoryCounterStore;
