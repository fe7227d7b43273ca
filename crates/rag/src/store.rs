//! Vector stores over document chunks.
//!
//! The JSON-file store keeps everything in memory and flushes on every
//! mutation with an atomic tmp-file + rename, mirroring the fact store.
//! Vectors are stored normalized, so ranking is a plain dot product.

use std::path::PathBuf;

use async_trait::async_trait;
use packrat_core::error::StoreError;
use packrat_core::rag::{DocumentChunk, VectorStore};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Item {
    chunk: DocumentChunk,
    vector: Vec<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    items: Vec<Item>,
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn rank(items: &[Item], query_vector: &[f32], top_k: usize) -> Vec<DocumentChunk> {
    let mut scored: Vec<(f32, &Item)> = items
        .iter()
        .map(|it| (dot(&it.vector, query_vector), it))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .take(top_k)
        .map(|(_, it)| it.chunk.clone())
        .collect()
}

fn upsert_items(items: &mut Vec<Item>, chunks: &[DocumentChunk], vectors: &[Vec<f32>]) {
    for (chunk, vector) in chunks.iter().zip(vectors) {
        let item = Item {
            chunk: chunk.clone(),
            vector: vector.clone(),
        };
        match items.iter_mut().find(|it| it.chunk.id == chunk.id) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
    }
}

/// JSON-file-backed vector store: `{ "items": [{chunk, vector}, …] }`.
pub struct JsonVectorStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl JsonVectorStore {
    /// Open (or create) the store at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = Self::load_from_disk(&path);
        debug!(path = %path.display(), chunks = data.items.len(), "Vector store loaded");
        Self {
            path,
            data: RwLock::new(data),
        }
    }

    fn load_from_disk(path: &PathBuf) -> StoreData {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return StoreData::default(),
        };
        if raw.trim().is_empty() {
            return StoreData::default();
        }
        match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt vector store, starting empty");
                StoreData::default()
            }
        }
    }

    async fn flush(&self) -> std::result::Result<(), StoreError> {
        let data = self.data.read().await;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Failed to create vector store directory: {e}"))
            })?;
        }

        let text = serde_json::to_string(&*data)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize vector store: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &text)
            .map_err(|e| StoreError::Storage(format!("Failed to write vector store: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| StoreError::Storage(format!("Failed to replace vector store: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for JsonVectorStore {
    async fn upsert(
        &self,
        chunks: &[DocumentChunk],
        vectors: &[Vec<f32>],
    ) -> std::result::Result<(), StoreError> {
        {
            let mut data = self.data.write().await;
            upsert_items(&mut data.items, chunks, vectors);
        }
        self.flush().await
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> std::result::Result<Vec<DocumentChunk>, StoreError> {
        let data = self.data.read().await;
        Ok(rank(&data.items, query_vector, top_k))
    }

    async fn count(&self) -> std::result::Result<usize, StoreError> {
        Ok(self.data.read().await.items.len())
    }

    async fn delete_by_source(&self, source: &str) -> std::result::Result<usize, StoreError> {
        let removed = {
            let mut data = self.data.write().await;
            let before = data.items.len();
            let needle = source.to_lowercase();
            data.items
                .retain(|it| it.chunk.source.to_lowercase() != needle);
            before - data.items.len()
        };
        if removed > 0 {
            self.flush().await?;
        }
        Ok(removed)
    }
}

/// In-memory vector store — for tests and ephemeral sessions.
#[derive(Default)]
pub struct InMemoryVectorStore {
    items: RwLock<Vec<Item>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        chunks: &[DocumentChunk],
        vectors: &[Vec<f32>],
    ) -> std::result::Result<(), StoreError> {
        let mut items = self.items.write().await;
        upsert_items(&mut items, chunks, vectors);
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> std::result::Result<Vec<DocumentChunk>, StoreError> {
        let items = self.items.read().await;
        Ok(rank(&items, query_vector, top_k))
    }

    async fn count(&self) -> std::result::Result<usize, StoreError> {
        Ok(self.items.read().await.len())
    }

    async fn delete_by_source(&self, source: &str) -> std::result::Result<usize, StoreError> {
        let mut items = self.items.write().await;
        let before = items.len();
        let needle = source.to_lowercase();
        items.retain(|it| it.chunk.source.to_lowercase() != needle);
        Ok(before - items.len())
    }
}
