//! Summarizer trait — compacts dropped history into a short summary.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::message::Message;

/// The summarization capability.
///
/// `max_tokens` is a target, not a guarantee — implementations may exceed
/// it, and the caller re-measures the result before trusting it.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        messages: &[Message],
        max_tokens: usize,
    ) -> std::result::Result<String, ProviderError>;
}
