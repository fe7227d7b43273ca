//! Deterministic mock LLM clients — no network, stable output.

use async_trait::async_trait;
use packrat_core::error::ProviderError;
use packrat_core::llm::{LlmClient, LlmResponse, LlmUsage};
use packrat_core::message::{Message, Role};

/// Echoes the last user message back.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoLlm;

#[async_trait]
impl LlmClient for EchoLlm {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        messages: &[Message],
        _max_output_tokens: usize,
    ) -> std::result::Result<LlmResponse, ProviderError> {
        let last_user = messages.iter().rev().find(|m| m.role == Role::User);
        let text = format!(
            "[mock] Reply to: {}",
            last_user.map(|m| m.content.as_str()).unwrap_or_default()
        );
        Ok(LlmResponse {
            text,
            usage: LlmUsage::default(),
        })
    }
}

/// Answers from a fixed substring → reply table.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLlm {
    rules: Vec<(String, String)>,
}

impl ScriptedLlm {
    pub fn new(rules: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        messages: &[Message],
        _max_output_tokens: usize,
    ) -> std::result::Result<LlmResponse, ProviderError> {
        let prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.to_lowercase())
            .unwrap_or_default();

        for (needle, reply) in &self.rules {
            if prompt.contains(&needle.to_lowercase()) {
                return Ok(LlmResponse {
                    text: reply.clone(),
                    usage: LlmUsage::default(),
                });
            }
        }

        Ok(LlmResponse {
            text: "[mock] I don't know what to say.".into(),
            usage: LlmUsage::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_replies_with_last_user_message() {
        let resp = EchoLlm
            .generate(&[Message::user("first"), Message::user("second")], 100)
            .await
            .unwrap();
        assert_eq!(resp.text, "[mock] Reply to: second");
    }

    #[tokio::test]
    async fn scripted_matches_substring_case_insensitive() {
        let llm = ScriptedLlm::new([("weather".to_string(), "Sunny.".to_string())]);
        let resp = llm
            .generate(&[Message::user("How's the WEATHER today?")], 100)
            .await
            .unwrap();
        assert_eq!(resp.text, "Sunny.");
    }

    #[tokio::test]
    async fn scripted_falls_back_when_nothing_matches() {
        let llm = ScriptedLlm::new([("weather".to_string(), "Sunny.".to_string())]);
        let resp = llm.generate(&[Message::user("hello")], 100).await.unwrap();
        assert!(resp.text.starts_with("[mock]"));
    }
}
