//! User-memory domain types and capabilities.
//!
//! Facts are keyed observations about a user ("name", "likes:coffee",
//! "project.current") with a confidence score. The reconciliation rule
//! lives in `packrat-memory`; this module only defines the data and the
//! store/extractor seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::message::Message;

/// A single persisted fact about a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMemoryFact {
    /// Stable id derived from (user_id, key)
    pub fact_id: String,

    /// Fact key, e.g. "name", "likes:rust", "project.current"
    pub key: String,

    /// Fact value
    pub value: String,

    /// Extraction confidence in [0, 1]
    pub confidence: f32,

    /// Last time this fact was written
    pub updated_at: DateTime<Utc>,

    /// The message this fact was last extracted from
    pub source_message_id: String,
}

/// A fact candidate produced by an extractor, before reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryCandidate {
    pub key: String,
    pub value: String,
    pub confidence: f32,
}

/// Extracts fact candidates from a single message.
///
/// Pure and synchronous — rule-based extractors need no I/O.
pub trait MemoryExtractor: Send + Sync {
    fn extract(&self, message: &Message) -> Vec<MemoryCandidate>;
}

/// Persistent storage of user facts.
///
/// Implementations: JSON file, in-memory (for tests).
#[async_trait]
pub trait FactStore: Send + Sync {
    /// All facts for a user. Order is unspecified.
    async fn get_facts(
        &self,
        user_id: &str,
    ) -> std::result::Result<Vec<UserMemoryFact>, MemoryError>;

    /// Insert or replace a fact by its `fact_id`.
    async fn upsert_fact(
        &self,
        user_id: &str,
        fact: UserMemoryFact,
    ) -> std::result::Result<(), MemoryError>;

    /// Delete one fact by id. Returns whether anything was removed.
    async fn delete_fact(
        &self,
        user_id: &str,
        fact_id: &str,
    ) -> std::result::Result<bool, MemoryError>;

    /// Delete every fact with the given key. Returns the removed count.
    async fn delete_by_key(
        &self,
        user_id: &str,
        key: &str,
    ) -> std::result::Result<usize, MemoryError>;

    /// Remove all facts for a user.
    async fn clear(&self, user_id: &str) -> std::result::Result<(), MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_serialization() {
        let fact = UserMemoryFact {
            fact_id: "ab12".into(),
            key: "likes:rust".into(),
            value: "rust".into(),
            confidence: 0.7,
            updated_at: Utc::now(),
            source_message_id: "m1".into(),
        };
        let json = serde_json::to_string(&fact).unwrap();
        assert!(json.contains("likes:rust"));
        let back: UserMemoryFact = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key, "likes:rust");
    }
}
