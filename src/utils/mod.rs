//! Utility modules shared across the reconciliation engine

pub mod json_store;
pub mod memory_store;
pub mod money;

pub use json_store::JsonFileStore;
pub use memory_store::MemoryStore;
