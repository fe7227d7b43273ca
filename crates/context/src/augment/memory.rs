//! User-memory augmentor.
//!
//! Renders the user's persisted facts into one pinned "profile" system
//! message, inserted right after the pinned prefix. The block is re-rendered
//! from the store every turn, so it is always safe to drop and regenerate.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use packrat_core::augment::{ContextAugmentor, insertion_index};
use packrat_core::error::Error;
use packrat_core::memory::{FactStore, UserMemoryFact};
use packrat_core::message::{
    Conversation, META_PINNED, META_TYPE, Message, Role, TYPE_USER_MEMORY,
};
use packrat_core::tokens::TokenCounter;
use tracing::debug;

/// Default token cap for the rendered profile block.
pub const DEFAULT_MEMORY_TOKENS: usize = 180;

/// Injects a "User profile (memory):" block built from the fact store.
pub struct MemoryAugmentor {
    store: Arc<dyn FactStore>,
    counter: Arc<dyn TokenCounter>,
    user_id: String,
    max_tokens: usize,
}

fn is_memory_message(m: &Message) -> bool {
    m.role == Role::System && m.meta_type() == Some(TYPE_USER_MEMORY)
}

impl MemoryAugmentor {
    pub fn new(
        store: Arc<dyn FactStore>,
        counter: Arc<dyn TokenCounter>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            counter,
            user_id: user_id.into(),
            max_tokens: DEFAULT_MEMORY_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn render_lines(facts: &[UserMemoryFact]) -> Vec<String> {
        let mut lines = vec!["User profile (memory):".to_string()];

        let name = facts.iter().find(|f| f.key == "name");
        let project = facts.iter().find(|f| f.key == "project.current");
        let goal = facts.iter().find(|f| f.key == "goal.current");
        let likes: Vec<&UserMemoryFact> =
            facts.iter().filter(|f| f.key.starts_with("likes:")).collect();
        let dislikes: Vec<&UserMemoryFact> = facts
            .iter()
            .filter(|f| f.key.starts_with("dislikes:"))
            .collect();

        if let Some(f) = name {
            lines.push(format!("- Name: {}", f.value));
        }
        if let Some(f) = project {
            lines.push(format!("- Project: {}", f.value));
        }
        if let Some(f) = goal {
            lines.push(format!("- Goal: {}", f.value));
        }
        if !likes.is_empty() {
            let joined = likes
                .iter()
                .take(5)
                .map(|f| f.value.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("- Likes: {joined}"));
        }
        if !dislikes.is_empty() {
            let joined = dislikes
                .iter()
                .take(5)
                .map(|f| f.value.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("- Dislikes: {joined}"));
        }

        // Nothing matched the known shapes — fall back to raw pairs.
        if lines.len() == 1 {
            for f in facts.iter().take(10) {
                lines.push(format!("- {} = {}", f.key, f.value));
            }
        }

        lines
    }

    fn build_message(
        &self,
        lines: &[String],
        created_at: chrono::DateTime<Utc>,
    ) -> Message {
        let mut msg = Message {
            id: "user_memory".to_string(),
            role: Role::System,
            content: lines.join("\n"),
            created_at,
            meta: serde_json::Map::new(),
        };
        msg.meta
            .insert(META_TYPE.into(), TYPE_USER_MEMORY.into());
        msg.meta.insert(META_PINNED.into(), true.into());
        msg
    }
}

#[async_trait]
impl ContextAugmentor for MemoryAugmentor {
    async fn augment(
        &self,
        convo: &Conversation,
        draft: Vec<Message>,
    ) -> std::result::Result<Vec<Message>, Error> {
        let mut base: Vec<Message> = draft
            .into_iter()
            .filter(|m| !is_memory_message(m))
            .collect();

        let mut facts = self.store.get_facts(&self.user_id).await?;
        if facts.is_empty() {
            return Ok(base);
        }

        facts.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
                .then(b.updated_at.cmp(&a.updated_at))
        });

        let lines = Self::render_lines(&facts);
        let created_at = base
            .first()
            .map(|m| m.created_at)
            .or_else(|| convo.messages.first().map(|m| m.created_at))
            .unwrap_or_else(Utc::now);

        let mut msg = self.build_message(&lines, created_at);
        let mut tokens = self.counter.count_messages(std::slice::from_ref(&msg));
        if tokens > self.max_tokens {
            let kept = &lines[..lines.len().min(8)];
            msg = self.build_message(kept, created_at);
            tokens = self.counter.count_messages(std::slice::from_ref(&msg));
        }
        msg.set_cached_tokens(tokens);

        debug!(facts = facts.len(), tokens, "Injected user-memory block");

        let at = insertion_index(&base);
        base.insert(at, msg);
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::ApproxTokenCounter;
    use packrat_core::error::MemoryError;
    use tokio::sync::Mutex;

    struct StubFacts(Mutex<Vec<UserMemoryFact>>);

    #[async_trait]
    impl FactStore for StubFacts {
        async fn get_facts(
            &self,
            _user_id: &str,
        ) -> std::result::Result<Vec<UserMemoryFact>, MemoryError> {
            Ok(self.0.lock().await.clone())
        }
        async fn upsert_fact(
            &self,
            _user_id: &str,
            fact: UserMemoryFact,
        ) -> std::result::Result<(), MemoryError> {
            self.0.lock().await.push(fact);
            Ok(())
        }
        async fn delete_fact(
            &self,
            _user_id: &str,
            _fact_id: &str,
        ) -> std::result::Result<bool, MemoryError> {
            Ok(false)
        }
        async fn delete_by_key(
            &self,
            _user_id: &str,
            _key: &str,
        ) -> std::result::Result<usize, MemoryError> {
            Ok(0)
        }
        async fn clear(&self, _user_id: &str) -> std::result::Result<(), MemoryError> {
            Ok(())
        }
    }

    fn fact(key: &str, value: &str, confidence: f32) -> UserMemoryFact {
        UserMemoryFact {
            fact_id: key.replace(':', "_"),
            key: key.into(),
            value: value.into(),
            confidence,
            updated_at: Utc::now(),
            source_message_id: "m1".into(),
        }
    }

    fn augmentor(facts: Vec<UserMemoryFact>) -> MemoryAugmentor {
        MemoryAugmentor::new(
            Arc::new(StubFacts(Mutex::new(facts))),
            Arc::new(ApproxTokenCounter::default()),
            "u1",
        )
    }

    #[tokio::test]
    async fn injects_profile_after_pinned_prefix() {
        let aug = augmentor(vec![
            fact("name", "Alice", 0.9),
            fact("likes:rust", "rust", 0.7),
        ]);
        let convo = Conversation::default();
        let draft = vec![Message::pinned_system("sys"), Message::user("hello")];

        let out = aug.augment(&convo, draft).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[1].meta_type(), Some(TYPE_USER_MEMORY));
        assert!(out[1].content.contains("Name: Alice"));
        assert!(out[1].content.contains("Likes: rust"));
        assert!(out[1].is_pinned());
        assert!(out[1].cached_tokens().is_some());
    }

    #[tokio::test]
    async fn no_facts_leaves_draft_unchanged() {
        let aug = augmentor(vec![]);
        let convo = Conversation::default();
        let draft = vec![Message::pinned_system("sys"), Message::user("hello")];

        let out = aug.augment(&convo, draft).await.unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|m| m.meta_type() != Some(TYPE_USER_MEMORY)));
    }

    #[tokio::test]
    async fn idempotent_across_runs() {
        let aug = augmentor(vec![fact("name", "Alice", 0.9)]);
        let convo = Conversation::default();
        let draft = vec![Message::pinned_system("sys"), Message::user("hello")];

        let once = aug.augment(&convo, draft).await.unwrap();
        let twice = aug.augment(&convo, once.clone()).await.unwrap();

        let count = twice
            .iter()
            .filter(|m| m.meta_type() == Some(TYPE_USER_MEMORY))
            .count();
        assert_eq!(count, 1);
        assert_eq!(once.len(), twice.len());
    }

    #[tokio::test]
    async fn oversized_profile_shrinks_to_eight_lines() {
        let facts: Vec<UserMemoryFact> = (0..20)
            .map(|i| {
                fact(
                    &format!("topic.{i}"),
                    &format!("a fairly long value describing subject number {i}"),
                    0.5,
                )
            })
            .collect();
        let aug = augmentor(facts).with_max_tokens(40);
        let convo = Conversation::default();
        let draft = vec![Message::pinned_system("sys")];

        let out = aug.augment(&convo, draft).await.unwrap();
        let mem = out
            .iter()
            .find(|m| m.meta_type() == Some(TYPE_USER_MEMORY))
            .unwrap();
        assert!(mem.content.lines().count() <= 8);
    }
}
