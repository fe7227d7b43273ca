//! Summarizer implementations.
//!
//! `CompactingSummarizer` is deterministic and offline: one bullet per
//! message, trimmed until the 4-chars/token estimate fits the target.
//! `LlmSummarizer` asks any `LlmClient` to write the summary instead.

use std::sync::Arc;

use async_trait::async_trait;
use packrat_core::error::ProviderError;
use packrat_core::llm::LlmClient;
use packrat_core::message::{Message, Role};
use packrat_core::summarize::Summarizer;

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Deterministic bullet-point summarizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactingSummarizer;

impl CompactingSummarizer {
    fn role_label(m: &Message) -> &'static str {
        match m.role {
            Role::User => "U",
            Role::Assistant => "A",
            Role::System => "SYSTEM",
            Role::Tool => "TOOL",
        }
    }

    fn render(lines: &[String]) -> String {
        if lines.is_empty() {
            "Summary (auto): (empty)".to_string()
        } else {
            format!("Summary (auto):\n{}", lines.join("\n"))
        }
    }
}

#[async_trait]
impl Summarizer for CompactingSummarizer {
    async fn summarize(
        &self,
        messages: &[Message],
        max_tokens: usize,
    ) -> std::result::Result<String, ProviderError> {
        let mut lines: Vec<String> = messages
            .iter()
            .map(|m| {
                let snippet = truncate_chars(&normalize(&m.content), 160);
                format!("- {}: {}", Self::role_label(m), snippet)
            })
            .collect();
        lines.truncate(15);

        let mut text = Self::render(&lines);

        // Trim whole bullets first, then hard-cap on characters.
        while text.len() / 4 > max_tokens && lines.len() > 1 {
            lines.pop();
            text = Self::render(&lines);
        }

        let hard_max_chars = (max_tokens * 4).max(20);
        Ok(truncate_chars(&text, hard_max_chars))
    }
}

/// LLM-backed summarizer: turns the dropped history into a transcript and
/// asks the model for bullet points.
pub struct LlmSummarizer {
    llm: Arc<dyn LlmClient>,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        messages: &[Message],
        max_tokens: usize,
    ) -> std::result::Result<String, ProviderError> {
        if messages.is_empty() {
            return Ok("Summary: (empty)".to_string());
        }

        let mut lines: Vec<String> = Vec::new();
        for m in messages {
            // Plain system prompts stay out of summaries; a wrapped rolling
            // summary comes back in so its content is not lost.
            if m.role == Role::System && !m.is_summary() {
                continue;
            }
            let content = m.content.trim();
            if content.is_empty() {
                continue;
            }
            let label = if m.is_summary() {
                "SUMMARY".to_string()
            } else {
                format!("{:?}", m.role).to_uppercase()
            };
            lines.push(format!("{label}: {content}"));
        }

        let transcript = if lines.is_empty() {
            "(no text)".to_string()
        } else {
            lines.join("\n")
        };

        let prompt = format!(
            "Summarize the conversation concisely (10-15 bullet points). \
             Preserve facts, decisions, commitments, and user preferences. \
             No filler.\n\nCONVERSATION:\n{transcript}\n"
        );

        let request = vec![
            Message::pinned_system(
                "You are a precise summarizer. Output concise bullet points.",
            ),
            Message::user(prompt),
        ];

        let resp = self.llm.generate(&request, max_tokens).await?;
        Ok(resp.text.trim().to_string())
    }
}
