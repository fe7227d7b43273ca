//! Ollama LLM client.
//!
//! Talks to a local Ollama daemon via `POST /api/chat` (non-streaming).
//! `max_output_tokens` maps to `num_predict`.

use async_trait::async_trait;
use packrat_core::error::ProviderError;
use packrat_core::llm::{LlmClient, LlmResponse, LlmUsage};
use packrat_core::message::{Message, Role};
use serde::Deserialize;
use tracing::{debug, warn};

/// Default daemon address.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
/// Default model tag.
pub const DEFAULT_MODEL: &str = "llama3.1:8b";

/// HTTP client for an Ollama daemon.
pub struct OllamaClient {
    base_url: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.2,
            client,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    message: Option<ApiMessage>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
    #[serde(default)]
    eval_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        messages: &[Message],
        max_output_tokens: usize,
    ) -> std::result::Result<LlmResponse, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);

        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": Self::role_str(m.role),
                    "content": m.content,
                })
            })
            .collect();

        let body = serde_json::json!({
            "model": self.model,
            "messages": api_messages,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": max_output_tokens,
            },
        });

        debug!(model = %self.model, messages = messages.len(), "Sending Ollama chat request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Ollama returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        let text = api
            .message
            .map(|m| m.content)
            .filter(|t| !t.trim().is_empty())
            .or(api.response)
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(LlmResponse {
            text,
            usage: LlmUsage {
                input_tokens: api.prompt_eval_count.unwrap_or(0),
                output_tokens: api.eval_count.unwrap_or(0),
            },
        })
    }
}
