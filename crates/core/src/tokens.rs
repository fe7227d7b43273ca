//! TokenCounter trait — the token-counting capability.
//!
//! Counting must be consistent within a turn but is not required to be a
//! pure function of content across backends. The one hard rule: a message
//! that carries a cached cost in `meta.tokens` MUST be summed using that
//! cached value rather than recounted, so summary bookkeeping and budget
//! accounting stay coherent as messages age.

use crate::message::Message;

/// The token-counting capability.
///
/// Implementations: character-ratio approximation (default), or any real
/// tokenizer backend.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in a bare string.
    fn count_text(&self, text: &str) -> usize;

    /// Count the total cost of a message list, honoring cached per-message
    /// costs in `meta.tokens`.
    fn count_messages(&self, messages: &[Message]) -> usize;
}
