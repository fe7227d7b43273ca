//! LlmClient trait — the abstraction over LLM backends.
//!
//! A client knows how to send a fitted message list to a model and get a
//! complete response back. Transport failures propagate to the caller of
//! the turn; the engine never retries or falls back on its own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// Token usage reported by the model call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    #[serde(default)]
    pub input_tokens: usize,
    #[serde(default)]
    pub output_tokens: usize,
}

/// A complete response from an LLM backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub text: String,
    /// Token usage statistics
    #[serde(default)]
    pub usage: LlmUsage,
}

/// The generation capability.
///
/// Implementations: Ollama, deterministic mocks for tests.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// A human-readable backend name (e.g. "ollama", "mock").
    fn name(&self) -> &str;

    /// Send the fitted context and get a complete response.
    async fn generate(
        &self,
        messages: &[Message],
        max_output_tokens: usize,
    ) -> std::result::Result<LlmResponse, ProviderError>;
}
