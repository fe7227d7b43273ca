//! ConversationStore trait — persistent conversation history.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{Conversation, ConversationId};

/// Conversation persistence.
///
/// `load` never fails on a missing id: it returns a fresh empty
/// conversation instead, so a new chat and a resumed chat take the same
/// code path. The engine performs a full load-modify-save cycle per turn
/// with no optimistic concurrency check; callers must serialize turns for
/// the same conversation id.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, id: &ConversationId) -> std::result::Result<Conversation, StoreError>;

    async fn save(&self, convo: &Conversation) -> std::result::Result<(), StoreError>;
}
