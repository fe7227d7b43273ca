//! # Packrat Core
//!
//! Domain types, capability traits, and error definitions for the packrat
//! chat engine. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the engine needs (token counting, generation,
//! summarization, persistence, user memory, retrieval) is defined as a
//! narrow trait here. Implementations live in their respective crates.
//! This enables:
//! - Swapping backends via configuration
//! - Easy testing with deterministic mock implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod augment;
pub mod error;
pub mod llm;
pub mod memory;
pub mod message;
pub mod rag;
pub mod repo;
pub mod summarize;
pub mod tokens;
pub mod truncation;

// Re-export key types at crate root for ergonomics
pub use augment::ContextAugmentor;
pub use error::{Error, MemoryError, ProviderError, Result, StoreError};
pub use llm::{LlmClient, LlmResponse, LlmUsage};
pub use memory::{FactStore, MemoryCandidate, MemoryExtractor, UserMemoryFact};
pub use message::{Conversation, ConversationId, Message, Role};
pub use rag::{Chunker, DocumentChunk, DocumentLoader, Embedder, LoadedPage, VectorStore};
pub use repo::ConversationStore;
pub use summarize::Summarizer;
pub use tokens::TokenCounter;
pub use truncation::TruncationPolicy;
