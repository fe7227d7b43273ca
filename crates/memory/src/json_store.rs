//! File-based fact store — one JSON document for all users.
//!
//! Layout:
//!
//! ```json
//! {
//!   "users": {
//!     "<user_id>": {
//!       "<fact_id>": { "key": "...", "value": "...", "confidence": 0.7,
//!                       "updated_at": "...", "source_message_id": "..." }
//!     }
//!   }
//! }
//! ```
//!
//! Entries are loaded into memory on creation and flushed to disk on every
//! mutation with an atomic tmp-file + rename, so a crash mid-write never
//! leaves a half-written store. An unreadable file is moved aside to
//! `<path>.bad` and the store starts empty.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use packrat_core::error::MemoryError;
use packrat_core::memory::{FactStore, UserMemoryFact};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FactRecord {
    key: String,
    value: String,
    confidence: f32,
    updated_at: DateTime<Utc>,
    source_message_id: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    users: HashMap<String, HashMap<String, FactRecord>>,
}

/// JSON-file-backed fact store.
pub struct JsonFactStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl JsonFactStore {
    /// Open (or create) the store at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = Self::load_from_disk(&path);
        debug!(path = %path.display(), users = data.users.len(), "Fact store loaded");
        Self {
            path,
            data: RwLock::new(data),
        }
    }

    fn load_from_disk(path: &PathBuf) -> StoreData {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return StoreData::default(), // no file yet
        };
        if raw.trim().is_empty() {
            return StoreData::default();
        }
        match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt fact store, moving aside");
                let bad = path.with_extension("json.bad");
                let _ = std::fs::rename(path, &bad);
                StoreData::default()
            }
        }
    }

    async fn flush(&self) -> std::result::Result<(), MemoryError> {
        let data = self.data.read().await;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let text = serde_json::to_string_pretty(&*data)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize facts: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &text)
            .map_err(|e| MemoryError::Storage(format!("Failed to write fact store: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| MemoryError::Storage(format!("Failed to replace fact store: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl FactStore for JsonFactStore {
    async fn get_facts(
        &self,
        user_id: &str,
    ) -> std::result::Result<Vec<UserMemoryFact>, MemoryError> {
        let data = self.data.read().await;
        Ok(data
            .users
            .get(user_id)
            .map(|facts| {
                facts
                    .iter()
                    .map(|(fid, r)| UserMemoryFact {
                        fact_id: fid.clone(),
                        key: r.key.clone(),
                        value: r.value.clone(),
                        confidence: r.confidence,
                        updated_at: r.updated_at,
                        source_message_id: r.source_message_id.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert_fact(
        &self,
        user_id: &str,
        fact: UserMemoryFact,
    ) -> std::result::Result<(), MemoryError> {
        {
            let mut data = self.data.write().await;
            data.users.entry(user_id.to_string()).or_default().insert(
                fact.fact_id.clone(),
                FactRecord {
                    key: fact.key,
                    value: fact.value,
                    confidence: fact.confidence,
                    updated_at: fact.updated_at,
                    source_message_id: fact.source_message_id,
                },
            );
        }
        self.flush().await
    }

    async fn delete_fact(
        &self,
        user_id: &str,
        fact_id: &str,
    ) -> std::result::Result<bool, MemoryError> {
        let deleted = {
            let mut data = self.data.write().await;
            data.users
                .get_mut(user_id)
                .and_then(|facts| facts.remove(fact_id))
                .is_some()
        };
        if deleted {
            self.flush().await?;
        }
        Ok(deleted)
    }

    async fn delete_by_key(
        &self,
        user_id: &str,
        key: &str,
    ) -> std::result::Result<usize, MemoryError> {
        let removed = {
            let mut data = self.data.write().await;
            match data.users.get_mut(user_id) {
                Some(facts) => {
                    let before = facts.len();
                    facts.retain(|_, r| r.key != key);
                    before - facts.len()
                }
                None => 0,
            }
        };
        if removed > 0 {
            self.flush().await?;
        }
        Ok(removed)
    }

    async fn clear(&self, user_id: &str) -> std::result::Result<(), MemoryError> {
        {
            let mut data = self.data.write().await;
            data.users.insert(user_id.to_string(), HashMap::new());
        }
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fact(key: &str, value: &str) -> UserMemoryFact {
        UserMemoryFact {
            fact_id: format!("id_{key}"),
            key: key.into(),
            value: value.into(),
            confidence: 0.7,
            updated_at: Utc::now(),
            source_message_id: "m1".into(),
        }
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mem.json");

        let store = JsonFactStore::new(&path);
        store.upsert_fact("u1", fact("name", "Alice")).await.unwrap();

        let reopened = JsonFactStore::new(&path);
        let facts = reopened.get_facts("u1").await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].value, "Alice");
    }

    #[tokio::test]
    async fn delete_fact_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mem.json");

        let store = JsonFactStore::new(&path);
        store.upsert_fact("u1", fact("name", "Alice")).await.unwrap();
        assert!(store.delete_fact("u1", "id_name").await.unwrap());

        let reopened = JsonFactStore::new(&path);
        assert!(reopened.get_facts("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_by_key_removes_all_matching() {
        let dir = TempDir::new().unwrap();
        let store = JsonFactStore::new(dir.path().join("mem.json"));

        store.upsert_fact("u1", fact("likes:tea", "tea")).await.unwrap();
        store
            .upsert_fact("u1", fact("likes:rust", "rust"))
            .await
            .unwrap();

        assert_eq!(store.delete_by_key("u1", "likes:tea").await.unwrap(), 1);
        assert_eq!(store.get_facts("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_empties_one_user() {
        let dir = TempDir::new().unwrap();
        let store = JsonFactStore::new(dir.path().join("mem.json"));

        store.upsert_fact("u1", fact("name", "Alice")).await.unwrap();
        store.upsert_fact("u2", fact("name", "Bob")).await.unwrap();
        store.clear("u1").await.unwrap();

        assert!(store.get_facts("u1").await.unwrap().is_empty());
        assert_eq!(store.get_facts("u2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mem.json");
        std::fs::write(&path, "this is not json").unwrap();

        let store = JsonFactStore::new(&path);
        assert!(store.get_facts("u1").await.unwrap().is_empty());
        // original moved aside
        assert!(path.with_extension("json.bad").exists());
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFactStore::new(dir.path().join("nope.json"));
        assert!(store.get_facts("u1").await.unwrap().is_empty());
    }
}
