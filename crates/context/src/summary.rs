//! Rolling summary compaction.
//!
//! When truncation drops enough history, the dropped messages are merged —
//! together with any existing summary — into a single new summary message.
//! There is never more than one live summary in a conversation, and the
//! range of original message ids it covers only ever grows.

use std::collections::HashSet;
use std::sync::Arc;

use packrat_core::error::Error;
use packrat_core::message::{
    Conversation, META_PINNED, META_TYPE, Message, Role, TYPE_SUMMARY,
};
use packrat_core::summarize::Summarizer;
use packrat_core::tokens::TokenCounter;
use tracing::debug;

/// Meta key on a summary: the inclusive id span it currently represents.
pub const META_SUMMARY_RANGE: &str = "summary_of_range";
/// Meta key on a summary: how much it subsumed, for observability/testing.
pub const META_REPLACED: &str = "replaced";

/// When and how aggressively to compact.
#[derive(Debug, Clone)]
pub struct SummaryPolicy {
    /// Minimum number of dropped messages before compaction fires.
    pub min_dropped_messages: usize,
    /// Token target handed to the summarizer (the result is re-measured).
    pub max_summary_tokens: usize,
    /// Optional periodic trigger on the non-system message count. Only
    /// consulted when at least one message was dropped.
    pub every_k_messages: Option<usize>,
}

impl Default for SummaryPolicy {
    fn default() -> Self {
        Self {
            min_dropped_messages: 4,
            max_summary_tokens: 256,
            every_k_messages: None,
        }
    }
}

/// The compactor: decides when dropped history should be merged into the
/// rolling summary and performs the merge.
pub struct SummaryBuffer {
    summarizer: Arc<dyn Summarizer>,
    counter: Arc<dyn TokenCounter>,
    policy: SummaryPolicy,
}

impl SummaryBuffer {
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        counter: Arc<dyn TokenCounter>,
        policy: SummaryPolicy,
    ) -> Self {
        Self {
            summarizer,
            counter,
            policy,
        }
    }

    /// Draft-context members absent from the fitted selection, excluding
    /// system-role messages (the summary itself and augmentor insertions
    /// are system-role and never re-summarized).
    pub fn compute_dropped(context: &[Message], fitted: &[Message]) -> Vec<Message> {
        let fitted_ids: HashSet<&str> = fitted.iter().map(|m| m.id.as_str()).collect();
        context
            .iter()
            .filter(|m| !fitted_ids.contains(m.id.as_str()) && m.role != Role::System)
            .cloned()
            .collect()
    }

    /// Whether this drop set warrants compaction.
    pub fn should_summarize(&self, convo: &Conversation, dropped: &[Message]) -> bool {
        if dropped.is_empty() {
            return false;
        }

        if dropped.len() >= self.policy.min_dropped_messages {
            return true;
        }

        if let Some(k) = self.policy.every_k_messages
            && k > 0
        {
            let non_system = convo
                .messages
                .iter()
                .filter(|m| m.role != Role::System)
                .count();
            return non_system % k == 0;
        }

        false
    }

    /// Merge the dropped messages (and any existing summary) into one new
    /// summary message, rewriting the conversation in place.
    ///
    /// Returns Ok(false) when nothing non-system remained to summarize.
    pub async fn apply(
        &self,
        convo: &mut Conversation,
        dropped: &[Message],
    ) -> std::result::Result<bool, Error> {
        // Summaries never summarize system prompts.
        let dropped: Vec<Message> = dropped
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect();
        if dropped.is_empty() {
            return Ok(false);
        }

        let existing = convo.live_summary().cloned();

        let mut to_summarize: Vec<Message> = Vec::new();
        if let Some(old) = &existing {
            let mut wrapped = old.clone();
            wrapped.content = format!("Current summary so far:\n{}", old.content);
            to_summarize.push(wrapped);
        }
        to_summarize.extend(dropped.iter().cloned());

        let summary_text = self
            .summarizer
            .summarize(&to_summarize, self.policy.max_summary_tokens)
            .await?;

        // The covered range chains across compactions: keep the oldest
        // recorded from_id so the span never shrinks.
        let from_id = existing
            .as_ref()
            .and_then(|s| s.meta.get(META_SUMMARY_RANGE))
            .and_then(|r| r.get("from_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| dropped[0].id.clone());
        let to_id = dropped.last().map(|m| m.id.clone()).unwrap_or_default();

        let mut replaced_count = dropped.len();
        let mut replaced_tokens = self.counter.count_messages(&dropped);
        if let Some(old) = &existing {
            replaced_count += 1;
            replaced_tokens += old
                .cached_tokens()
                .unwrap_or_else(|| self.counter.count_messages(std::slice::from_ref(old)));
        }

        let mut summary = Message::system(summary_text)
            .with_meta(META_TYPE, TYPE_SUMMARY)
            .with_meta(META_PINNED, true)
            .with_meta(
                META_SUMMARY_RANGE,
                serde_json::json!({ "from_id": from_id, "to_id": to_id }),
            )
            .with_meta(
                META_REPLACED,
                serde_json::json!({
                    "message_count": replaced_count,
                    "tokens": replaced_tokens,
                }),
            );
        let summary_tokens = self.counter.count_messages(std::slice::from_ref(&summary));
        summary.set_cached_tokens(summary_tokens);

        let mut remove_ids: HashSet<&str> = dropped.iter().map(|m| m.id.as_str()).collect();
        if let Some(old) = &existing {
            remove_ids.insert(old.id.as_str());
        }
        convo.messages.retain(|m| !remove_ids.contains(m.id.as_str()));

        // Place the summary right after the fixed system prompt, before the
        // rest of history.
        let mut insert_at = 0;
        for (i, m) in convo.messages.iter().enumerate() {
            if m.role == Role::System && !m.is_summary() {
                insert_at = i + 1;
            }
        }
        convo.messages.insert(insert_at, summary);

        debug!(
            replaced = replaced_count,
            replaced_tokens,
            summary_tokens,
            "Compacted dropped history into rolling summary"
        );

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::ApproxTokenCounter;
    use async_trait::async_trait;
    use packrat_core::error::ProviderError;

    /// Deterministic summarizer: one bullet per message, hard-capped.
    struct BulletSummarizer;

    #[async_trait]
    impl Summarizer for BulletSummarizer {
        async fn summarize(
            &self,
            messages: &[Message],
            max_tokens: usize,
        ) -> std::result::Result<String, ProviderError> {
            let mut text = messages
                .iter()
                .map(|m| format!("- {}", &m.content[..m.content.len().min(40)]))
                .collect::<Vec<_>>()
                .join("\n");
            text.truncate(max_tokens * 4);
            Ok(text)
        }
    }

    fn buffer(policy: SummaryPolicy) -> SummaryBuffer {
        SummaryBuffer::new(
            Arc::new(BulletSummarizer),
            Arc::new(ApproxTokenCounter::default()),
            policy,
        )
    }

    fn convo_with(messages: Vec<Message>) -> Conversation {
        let mut convo = Conversation::default();
        for m in messages {
            convo.push(m);
        }
        convo
    }

    fn user(id: &str, content: &str) -> Message {
        let mut m = Message::user(content);
        m.id = id.into();
        m
    }

    #[test]
    fn compute_dropped_excludes_system_and_fitted() {
        let context = vec![
            Message::pinned_system("sys"),
            user("u1", "one"),
            user("u2", "two"),
        ];
        let fitted = vec![context[0].clone(), context[2].clone()];
        let dropped = SummaryBuffer::compute_dropped(&context, &fitted);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].id, "u1");
    }

    #[test]
    fn should_summarize_thresholds() {
        let sb = buffer(SummaryPolicy {
            min_dropped_messages: 2,
            ..SummaryPolicy::default()
        });
        let convo = convo_with(vec![user("u1", "a")]);

        assert!(!sb.should_summarize(&convo, &[]));
        assert!(!sb.should_summarize(&convo, &[user("d1", "x")]));
        assert!(sb.should_summarize(&convo, &[user("d1", "x"), user("d2", "y")]));
    }

    #[test]
    fn periodic_trigger_fires_on_multiple_of_k() {
        let sb = buffer(SummaryPolicy {
            min_dropped_messages: 10,
            every_k_messages: Some(2),
            ..SummaryPolicy::default()
        });
        let convo = convo_with(vec![user("u1", "a"), user("u2", "b")]);
        // below the count threshold, but 2 non-system messages % 2 == 0
        assert!(sb.should_summarize(&convo, &[user("d1", "x")]));
    }

    #[tokio::test]
    async fn apply_creates_single_summary_with_bookkeeping() {
        let sb = buffer(SummaryPolicy::default());
        let counter = ApproxTokenCounter::default();

        let mut dropped = vec![
            user("u1", "first dropped message with some content"),
            user("u2", "second dropped message with more content"),
        ];
        for m in &mut dropped {
            let t = counter.count_messages(std::slice::from_ref(m));
            m.set_cached_tokens(t);
        }
        let dropped_tokens = counter.count_messages(&dropped);

        let mut convo = convo_with(vec![Message::pinned_system("sys")]);
        for m in &dropped {
            convo.push(m.clone());
        }
        convo.push(user("u3", "still live"));

        let changed = sb.apply(&mut convo, &dropped).await.unwrap();
        assert!(changed);

        let summaries: Vec<&Message> =
            convo.messages.iter().filter(|m| m.is_summary()).collect();
        assert_eq!(summaries.len(), 1);
        let sm = summaries[0];

        // placed right after the system prompt
        assert_eq!(convo.messages[1].id, sm.id);
        assert!(sm.is_pinned());
        assert!(sm.cached_tokens().is_some());

        let range = sm.meta.get(META_SUMMARY_RANGE).unwrap();
        assert_eq!(range["from_id"], "u1");
        assert_eq!(range["to_id"], "u2");

        let replaced = sm.meta.get(META_REPLACED).unwrap();
        assert_eq!(replaced["message_count"], 2);
        assert_eq!(replaced["tokens"], dropped_tokens);

        // dropped messages removed, live one kept
        assert!(convo.messages.iter().all(|m| m.id != "u1" && m.id != "u2"));
        assert!(convo.messages.iter().any(|m| m.id == "u3"));
    }

    #[tokio::test]
    async fn apply_chains_range_and_replaces_old_summary() {
        let sb = buffer(SummaryPolicy::default());

        let mut convo = convo_with(vec![Message::pinned_system("sys")]);
        let first = vec![user("u1", "oldest"), user("u2", "old")];
        for m in &first {
            convo.push(m.clone());
        }
        sb.apply(&mut convo, &first).await.unwrap();

        let second = vec![user("u3", "newer"), user("u4", "newest")];
        for m in &second {
            convo.push(m.clone());
        }
        sb.apply(&mut convo, &second).await.unwrap();

        let summaries: Vec<&Message> =
            convo.messages.iter().filter(|m| m.is_summary()).collect();
        assert_eq!(summaries.len(), 1, "at most one live summary");

        let range = summaries[0].meta.get(META_SUMMARY_RANGE).unwrap();
        assert_eq!(range["from_id"], "u1", "covered range never shrinks");
        assert_eq!(range["to_id"], "u4");

        let replaced = summaries[0].meta.get(META_REPLACED).unwrap();
        // two new messages plus the old summary itself
        assert_eq!(replaced["message_count"], 3);
    }

    #[tokio::test]
    async fn apply_skips_system_only_drop_set() {
        let sb = buffer(SummaryPolicy::default());
        let mut convo = convo_with(vec![Message::pinned_system("sys")]);
        let dropped = vec![Message::system("synthetic")];
        let changed = sb.apply(&mut convo, &dropped).await.unwrap();
        assert!(!changed);
        assert!(convo.live_summary().is_none());
    }
}
