//! Recency truncation — the default selection policy.
//!
//! Pinned messages always survive; everything else is a sliding window
//! filled from the most recent message backward. Recency is strict: the
//! scan stops at the first message that would overflow, it never skips
//! ahead to squeeze in an older, smaller one.

use packrat_core::message::Message;
use packrat_core::tokens::TokenCounter;
use packrat_core::truncation::TruncationPolicy;

/// Keep pinned messages unconditionally, then the most recent unpinned
/// messages that fit under the ceiling, in original chronological order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecencyTruncation;

impl TruncationPolicy for RecencyTruncation {
    fn fit(
        &self,
        messages: &[Message],
        counter: &dyn TokenCounter,
        max_input_tokens: usize,
    ) -> Vec<Message> {
        if messages.is_empty() {
            return Vec::new();
        }

        let pinned: Vec<Message> = messages.iter().filter(|m| m.is_pinned()).cloned().collect();
        let others: Vec<&Message> = messages.iter().filter(|m| !m.is_pinned()).collect();

        let pinned_tokens = counter.count_messages(&pinned);
        if pinned_tokens >= max_input_tokens {
            // Overflow is tolerated, not erased: degraded but non-empty.
            return pinned;
        }

        let mut kept_rev: Vec<Message> = Vec::new();
        let mut kept_tokens = 0;

        for m in others.into_iter().rev() {
            let m_tokens = counter.count_messages(std::slice::from_ref(m));
            if pinned_tokens + kept_tokens + m_tokens <= max_input_tokens {
                kept_rev.push(m.clone());
                kept_tokens += m_tokens;
            } else {
                break;
            }
        }

        let mut result = pinned;
        result.extend(kept_rev.into_iter().rev());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::ApproxTokenCounter;

    fn long_user(id: &str, len: usize) -> Message {
        let mut m = Message::user("x".repeat(len));
        m.id = id.into();
        m
    }

    #[test]
    fn keeps_pinned_system_under_tight_ceiling() {
        let counter = ApproxTokenCounter::default();
        let msgs = vec![
            Message::pinned_system("sys"),
            long_user("u1", 200),
            long_user("a1", 200),
            long_user("u2", 200),
        ];

        let fitted = RecencyTruncation.fit(&msgs, &counter, 30);
        assert!(!fitted.is_empty());
        assert!(fitted[0].is_pinned());
        assert!(counter.count_messages(&fitted) <= 30);
    }

    #[test]
    fn pinned_overflow_returns_pinned_only() {
        let counter = ApproxTokenCounter::default();
        let mut sys = Message::pinned_system("s".repeat(400));
        sys.id = "sys".into();
        let msgs = vec![sys, long_user("u1", 10)];

        let fitted = RecencyTruncation.fit(&msgs, &counter, 20);
        assert_eq!(fitted.len(), 1);
        assert_eq!(fitted[0].id, "sys");
    }

    #[test]
    fn prefers_most_recent_messages() {
        let counter = ApproxTokenCounter::default();
        // Each message costs 4 + 25 = 29 tokens; ceiling fits two.
        let msgs = vec![
            long_user("old", 100),
            long_user("mid", 100),
            long_user("new", 100),
        ];

        let fitted = RecencyTruncation.fit(&msgs, &counter, 60);
        let ids: Vec<&str> = fitted.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["mid", "new"]);
    }

    #[test]
    fn stops_at_first_overflow_without_skipping() {
        let counter = ApproxTokenCounter::default();
        // newest small, then a big one, then older small ones that would
        // fit — strict recency must not reach past the big one.
        let msgs = vec![
            long_user("older_small", 8),
            long_user("big", 400),
            long_user("newest_small", 8),
        ];

        let fitted = RecencyTruncation.fit(&msgs, &counter, 20);
        let ids: Vec<&str> = fitted.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["newest_small"]);
    }

    #[test]
    fn preserves_chronological_order() {
        let counter = ApproxTokenCounter::default();
        let msgs = vec![
            Message::pinned_system("sys"),
            long_user("u1", 20),
            long_user("u2", 20),
            long_user("u3", 20),
        ];

        let fitted = RecencyTruncation.fit(&msgs, &counter, 1000);
        let ids: Vec<&str> = fitted.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids[1..], ["u1", "u2", "u3"]);
    }

    #[test]
    fn empty_input_empty_output() {
        let counter = ApproxTokenCounter::default();
        assert!(RecencyTruncation.fit(&[], &counter, 100).is_empty());
    }
}
