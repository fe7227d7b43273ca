//! Message and Conversation domain types.
//!
//! These are the core value objects that flow through the entire system:
//! a user message enters, the engine assembles a fitted context around it,
//! the LLM replies, and the whole conversation is persisted.
//!
//! A message's `meta` map carries the reserved keys the engine relies on:
//! - `pinned: true` — never dropped by truncation or compaction
//! - `tokens: int` — cached token cost, computed once and immutable after
//! - `type` — `"summary"`, `"retrieved_context"`, or `"user_memory"` for
//!   synthetic messages
//! - `summary_of_range` / `replaced` — rolling-summary bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Meta key: message must never be dropped.
pub const META_PINNED: &str = "pinned";
/// Meta key: cached per-message token cost.
pub const META_TOKENS: &str = "tokens";
/// Meta key: synthetic message kind.
pub const META_TYPE: &str = "type";
/// Meta `type` value for the rolling summary.
pub const TYPE_SUMMARY: &str = "summary";
/// Meta `type` value for retrieval-injected context.
pub const TYPE_RETRIEVED: &str = "retrieved_context";
/// Meta `type` value for the user-memory profile block.
pub const TYPE_USER_MEMORY: &str = "user_memory";

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions, summaries, injected context
    System,
    /// Tool execution result
    Tool,
}

/// A single immutable message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID (unique within a conversation)
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub created_at: DateTime<Utc>,

    /// Open metadata map; see the `META_*` key constants
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            meta: serde_json::Map::new(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a pinned system message (never truncated or compacted).
    pub fn pinned_system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content).with_meta(META_PINNED, true)
    }

    /// Builder-style meta insertion.
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    /// Whether this message is pinned (`meta.pinned == true`).
    pub fn is_pinned(&self) -> bool {
        self.meta
            .get(META_PINNED)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// The cached token cost, if one has been computed.
    pub fn cached_tokens(&self) -> Option<usize> {
        self.meta
            .get(META_TOKENS)
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
    }

    /// Cache the token cost. A message's cost is fixed at creation; callers
    /// must not overwrite an existing value.
    pub fn set_cached_tokens(&mut self, tokens: usize) {
        self.meta
            .insert(META_TOKENS.to_string(), serde_json::json!(tokens));
    }

    /// The synthetic message kind, if any (`meta.type`).
    pub fn meta_type(&self) -> Option<&str> {
        self.meta.get(META_TYPE).and_then(|v| v.as_str())
    }

    /// Whether this is the live rolling-summary message.
    pub fn is_summary(&self) -> bool {
        self.role == Role::System && self.meta_type() == Some(TYPE_SUMMARY)
    }
}

/// A conversation is an ordered sequence of messages. Insertion order is
/// conversation order and is never reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered messages
    pub messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,

    /// Context-window ceiling recorded with the conversation
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Output allowance recorded with the conversation
    #[serde(default = "default_reserve_output_tokens")]
    pub reserve_output_tokens: usize,
}

fn default_max_context_tokens() -> usize {
    800
}

fn default_reserve_output_tokens() -> usize {
    200
}

impl Conversation {
    /// Create a new empty conversation with the given id.
    pub fn new(id: ConversationId) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            max_context_tokens: default_max_context_tokens(),
            reserve_output_tokens: default_reserve_output_tokens(),
        }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// The live rolling-summary message, if one exists.
    pub fn live_summary(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_summary())
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(ConversationId::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello there");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello there");
        assert!(!msg.is_pinned());
        assert!(msg.cached_tokens().is_none());
    }

    #[test]
    fn pinned_system_sets_meta() {
        let msg = Message::pinned_system("You are a helpful assistant.");
        assert_eq!(msg.role, Role::System);
        assert!(msg.is_pinned());
    }

    #[test]
    fn cached_tokens_roundtrip() {
        let mut msg = Message::user("hi");
        msg.set_cached_tokens(17);
        assert_eq!(msg.cached_tokens(), Some(17));
    }

    #[test]
    fn summary_detection() {
        let msg = Message::system("old stuff")
            .with_meta(META_TYPE, TYPE_SUMMARY)
            .with_meta(META_PINNED, true);
        assert!(msg.is_summary());
        assert!(!Message::system("plain").is_summary());
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::user("Test message").with_meta(META_TOKENS, 5);
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content, "Test message");
        assert_eq!(back.role, Role::User);
        assert_eq!(back.cached_tokens(), Some(5));
    }

    #[test]
    fn conversation_tracks_updates() {
        let mut convo = Conversation::new(ConversationId::from("c1"));
        let created = convo.created_at;
        convo.push(Message::user("First message"));
        assert_eq!(convo.messages.len(), 1);
        assert!(convo.updated_at >= created);
    }

    #[test]
    fn live_summary_lookup() {
        let mut convo = Conversation::new(ConversationId::from("c1"));
        assert!(convo.live_summary().is_none());
        convo.push(Message::system("sum").with_meta(META_TYPE, TYPE_SUMMARY));
        assert!(convo.live_summary().is_some());
    }
}
