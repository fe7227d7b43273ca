//! User-memory subsystem for packrat.
//!
//! Facts extracted from user messages are reconciled into a per-user store
//! (highest confidence wins per key) and rendered back into the context by
//! the memory augmentor.

pub mod extractor;
pub mod in_memory;
pub mod json_store;
pub mod manager;

pub use extractor::RuleBasedExtractor;
pub use in_memory::InMemoryFactStore;
pub use json_store::JsonFactStore;
pub use manager::{MemoryManager, MemoryUpdateResult, fact_id};
