//! ContextAugmentor trait — per-turn synthetic context injection.

use async_trait::async_trait;

use crate::error::Error;
use crate::message::{Conversation, Message};

/// Inserts at most one synthetic system message into the draft context.
///
/// Rules every implementation must follow:
/// - remove any previous instance of its own synthetic message type before
///   adding a fresh one (idempotent per turn)
/// - never mutate pinned or non-augmentor messages
/// - insert directly after the longest pinned prefix
///
/// Augmentors compose left-to-right; later augmentors see earlier
/// augmentors' insertions.
#[async_trait]
pub trait ContextAugmentor: Send + Sync {
    async fn augment(
        &self,
        convo: &Conversation,
        draft: Vec<Message>,
    ) -> std::result::Result<Vec<Message>, Error>;
}

/// Insertion index for an augmentor message: one past the last pinned
/// message, or the front when nothing is pinned.
pub fn insertion_index(draft: &[Message]) -> usize {
    draft
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_pinned())
        .map(|(i, _)| i + 1)
        .next_back()
        .unwrap_or(0)
}
