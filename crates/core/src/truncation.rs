//! TruncationPolicy trait — fits an ordered history under a token ceiling.

use crate::message::Message;
use crate::tokens::TokenCounter;

/// Selects the subset of a draft context that is sent to the model.
///
/// Contract: pinned messages are always present in the output; the output
/// preserves the relative order of the input; whenever the pinned set alone
/// fits under `max_input_tokens`, the selected total also fits.
pub trait TruncationPolicy: Send + Sync {
    fn fit(
        &self,
        messages: &[Message],
        counter: &dyn TokenCounter,
        max_input_tokens: usize,
    ) -> Vec<Message>;
}
