//! JSON-file conversation persistence — one file per conversation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use packrat_core::error::StoreError;
use packrat_core::message::{Conversation, ConversationId};
use packrat_core::repo::ConversationStore;
use tracing::debug;

/// Stores each conversation as `<dir>/<id>.json`, written atomically
/// (tmp file + rename). Loading an unknown id returns a fresh empty
/// conversation.
pub struct JsonConversationStore {
    dir: PathBuf,
}

impl JsonConversationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &ConversationId) -> PathBuf {
        // Conversation ids become file names; keep them path-safe.
        let safe: String = id
            .0
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl ConversationStore for JsonConversationStore {
    async fn load(&self, id: &ConversationId) -> std::result::Result<Conversation, StoreError> {
        let path = self.path_for(id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => {
                debug!(conversation_id = %id, "No stored conversation, starting fresh");
                return Ok(Conversation::new(id.clone()));
            }
        };
        serde_json::from_str(&raw).map_err(|e| {
            StoreError::Corrupt(format!("conversation {}: {e}", path.display()))
        })
    }

    async fn save(&self, convo: &Conversation) -> std::result::Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            StoreError::Storage(format!("Failed to create data directory: {e}"))
        })?;

        let text = serde_json::to_string_pretty(convo)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize conversation: {e}")))?;

        let path = self.path_for(&convo.id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &text)
            .map_err(|e| StoreError::Storage(format!("Failed to write conversation: {e}")))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| StoreError::Storage(format!("Failed to replace conversation: {e}")))?;
        Ok(())
    }
}

impl JsonConversationStore {
    /// Directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
