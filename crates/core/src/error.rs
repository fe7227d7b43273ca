//! Error types for the packrat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. Degraded-fit conditions
//! (pinned content over budget, nothing to summarize, no passage fits) are
//! deliberately NOT errors — only genuine collaborator failures live here.

use thiserror::Error;

/// The top-level error type for all packrat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- LLM / embedding backend errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- User memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Persistence / retrieval store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt data: {0}")]
    Corrupt(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("No loader for document: {0}")]
    UnsupportedDocument(String),
}
