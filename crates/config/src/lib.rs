//! Configuration loading, validation, and management for packrat.
//!
//! Loads configuration from a TOML file with `PACKRAT_*` environment
//! variable overrides. Malformed values fail fast at startup — the engine
//! never runs on a config it has not validated.

use packrat_core::error::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackratConfig {
    /// Engine-loop settings (budget, summary, memory, rag toggles)
    #[serde(default)]
    pub engine: EngineConfig,

    /// Retrieval settings
    #[serde(default)]
    pub rag: RagConfig,

    /// User-memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Conversation persistence settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    #[serde(default = "default_reserve_output_tokens")]
    pub reserve_output_tokens: usize,

    #[serde(default = "default_true")]
    pub enable_summary: bool,

    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: usize,

    #[serde(default = "default_summary_min_dropped")]
    pub summary_min_dropped: usize,

    #[serde(default = "default_true")]
    pub enable_memory: bool,

    #[serde(default = "default_memory_max_tokens")]
    pub memory_max_tokens: usize,

    #[serde(default = "default_true")]
    pub enable_rag: bool,

    /// off | auto | always
    #[serde(default = "default_rag_mode")]
    pub rag_mode: String,

    /// mock | ollama
    #[serde(default = "default_backend_mock")]
    pub llm_backend: String,

    /// mock | llm
    #[serde(default = "default_backend_mock")]
    pub summarizer_backend: String,

    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".into()
}
fn default_max_context_tokens() -> usize {
    800
}
fn default_reserve_output_tokens() -> usize {
    200
}
fn default_summary_max_tokens() -> usize {
    256
}
fn default_summary_min_dropped() -> usize {
    4
}
fn default_memory_max_tokens() -> usize {
    180
}
fn default_rag_mode() -> String {
    "auto".into()
}
fn default_backend_mock() -> String {
    "mock".into()
}
fn default_ollama_url() -> String {
    "http://127.0.0.1:11434".into()
}
fn default_ollama_model() -> String {
    "llama3.1:8b".into()
}
fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_context_tokens: default_max_context_tokens(),
            reserve_output_tokens: default_reserve_output_tokens(),
            enable_summary: true,
            summary_max_tokens: default_summary_max_tokens(),
            summary_min_dropped: default_summary_min_dropped(),
            enable_memory: true,
            memory_max_tokens: default_memory_max_tokens(),
            enable_rag: true,
            rag_mode: default_rag_mode(),
            llm_backend: default_backend_mock(),
            summarizer_backend: default_backend_mock(),
            ollama_url: default_ollama_url(),
            ollama_model: default_ollama_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_rag_store_path")]
    pub store_path: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_max_rag_tokens")]
    pub max_rag_tokens: usize,

    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,

    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
}

fn default_rag_store_path() -> String {
    "./rag_store.json".into()
}
fn default_top_k() -> usize {
    4
}
fn default_max_rag_tokens() -> usize {
    250
}
fn default_chunk_tokens() -> usize {
    800
}
fn default_overlap_tokens() -> usize {
    120
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            store_path: default_rag_store_path(),
            top_k: default_top_k(),
            max_rag_tokens: default_max_rag_tokens(),
            chunk_tokens: default_chunk_tokens(),
            overlap_tokens: default_overlap_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_store_path")]
    pub store_path: String,
}

fn default_memory_store_path() -> String {
    "./user_memory.json".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            store_path: default_memory_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "./data".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// --- Environment overrides ---

fn env_str(name: &str, slot: &mut String) {
    if let Ok(v) = std::env::var(name)
        && !v.trim().is_empty()
    {
        *slot = v;
    }
}

fn env_usize(name: &str, slot: &mut usize) {
    if let Ok(v) = std::env::var(name)
        && let Ok(parsed) = v.trim().parse()
    {
        *slot = parsed;
    }
}

fn env_bool(name: &str, slot: &mut bool) {
    if let Ok(v) = std::env::var(name) {
        match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "on" => *slot = true,
            "0" | "false" | "no" | "n" | "off" => *slot = false,
            _ => {}
        }
    }
}

impl PackratConfig {
    /// Load from a TOML file. A missing file yields the defaults; a file
    /// that exists but does not parse is a configuration error.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Ok(Self::default()),
        };
        toml::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {e}", path.display()),
        })
    }

    /// Apply `PACKRAT_*` environment overrides in place.
    pub fn apply_env_overrides(&mut self) {
        env_str("PACKRAT_SYSTEM_PROMPT", &mut self.engine.system_prompt);
        env_usize("PACKRAT_MAX_CONTEXT", &mut self.engine.max_context_tokens);
        env_usize(
            "PACKRAT_RESERVE_OUTPUT",
            &mut self.engine.reserve_output_tokens,
        );
        env_bool("PACKRAT_ENABLE_SUMMARY", &mut self.engine.enable_summary);
        env_usize(
            "PACKRAT_SUMMARY_MAX_TOKENS",
            &mut self.engine.summary_max_tokens,
        );
        env_usize(
            "PACKRAT_SUMMARY_MIN_DROPPED",
            &mut self.engine.summary_min_dropped,
        );
        env_bool("PACKRAT_ENABLE_MEMORY", &mut self.engine.enable_memory);
        env_usize(
            "PACKRAT_MEMORY_MAX_TOKENS",
            &mut self.engine.memory_max_tokens,
        );
        env_bool("PACKRAT_ENABLE_RAG", &mut self.engine.enable_rag);
        env_str("PACKRAT_RAG_MODE", &mut self.engine.rag_mode);
        env_str("PACKRAT_LLM", &mut self.engine.llm_backend);
        env_str("PACKRAT_SUMMARIZER", &mut self.engine.summarizer_backend);
        env_str("PACKRAT_OLLAMA_URL", &mut self.engine.ollama_url);
        env_str("PACKRAT_OLLAMA_MODEL", &mut self.engine.ollama_model);

        env_str("PACKRAT_RAG_STORE", &mut self.rag.store_path);
        env_usize("PACKRAT_RAG_TOPK", &mut self.rag.top_k);
        env_usize("PACKRAT_RAG_MAX_TOKENS", &mut self.rag.max_rag_tokens);
        env_usize("PACKRAT_CHUNK_TOKENS", &mut self.rag.chunk_tokens);
        env_usize("PACKRAT_OVERLAP_TOKENS", &mut self.rag.overlap_tokens);

        env_str("PACKRAT_MEMORY_STORE", &mut self.memory.store_path);
        env_str("PACKRAT_DATA_DIR", &mut self.storage.data_dir);
        env_str("PACKRAT_GATEWAY_HOST", &mut self.gateway.host);

        if let Ok(v) = std::env::var("PACKRAT_GATEWAY_PORT")
            && let Ok(port) = v.trim().parse()
        {
            self.gateway.port = port;
        }
    }

    /// Load from file, apply env overrides, and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, Error> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on malformed values.
    pub fn validate(&self) -> Result<(), Error> {
        fn err(message: impl Into<String>) -> Error {
            Error::Config {
                message: message.into(),
            }
        }

        if self.engine.max_context_tokens == 0 {
            return Err(err("engine.max_context_tokens must be > 0"));
        }
        if self.engine.summary_max_tokens == 0 {
            return Err(err("engine.summary_max_tokens must be > 0"));
        }
        if !matches!(self.engine.llm_backend.as_str(), "mock" | "ollama") {
            return Err(err(format!(
                "engine.llm_backend must be 'mock' or 'ollama', got '{}'",
                self.engine.llm_backend
            )));
        }
        if !matches!(self.engine.summarizer_backend.as_str(), "mock" | "llm") {
            return Err(err(format!(
                "engine.summarizer_backend must be 'mock' or 'llm', got '{}'",
                self.engine.summarizer_backend
            )));
        }
        if !matches!(self.engine.rag_mode.as_str(), "off" | "auto" | "always") {
            return Err(err(format!(
                "engine.rag_mode must be 'off', 'auto', or 'always', got '{}'",
                self.engine.rag_mode
            )));
        }
        if self.rag.top_k == 0 {
            return Err(err("rag.top_k must be > 0"));
        }
        if self.rag.chunk_tokens == 0 {
            return Err(err("rag.chunk_tokens must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PackratConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.max_context_tokens, 800);
        assert_eq!(config.engine.reserve_output_tokens, 200);
        assert_eq!(config.rag.max_rag_tokens, 250);
        assert_eq!(config.engine.rag_mode, "auto");
    }

    #[test]
    fn parses_partial_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("packrat.toml");
        std::fs::write(
            &path,
            r#"
[engine]
max_context_tokens = 2000
llm_backend = "ollama"

[rag]
top_k = 2
"#,
        )
        .unwrap();

        let config = PackratConfig::load(&path).unwrap();
        assert_eq!(config.engine.max_context_tokens, 2000);
        assert_eq!(config.engine.llm_backend, "ollama");
        assert_eq!(config.rag.top_k, 2);
        // untouched fields keep defaults
        assert_eq!(config.engine.reserve_output_tokens, 200);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = PackratConfig::load(Path::new("/nonexistent/packrat.toml")).unwrap();
        assert_eq!(config.engine.max_context_tokens, 800);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("packrat.toml");
        std::fs::write(&path, "engine = 5").unwrap();

        let err = PackratConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn validate_rejects_bad_backend() {
        let mut config = PackratConfig::default();
        config.engine.llm_backend = "gpt".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_rag_mode() {
        let mut config = PackratConfig::default();
        config.engine.rag_mode = "sometimes".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_budget() {
        let mut config = PackratConfig::default();
        config.engine.max_context_tokens = 0;
        assert!(config.validate().is_err());
    }
}
