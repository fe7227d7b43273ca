//! LLM backends and summarizers for packrat.
//!
//! All implementations sit behind the core `LlmClient` / `Summarizer`
//! traits: deterministic mocks for tests and offline use, an Ollama HTTP
//! client for real generation, and summarizer adapters on both.

pub mod mock;
pub mod ollama;
pub mod summarize;

pub use mock::{EchoLlm, ScriptedLlm};
pub use ollama::OllamaClient;
pub use summarize::{CompactingSummarizer, LlmSummarizer};
