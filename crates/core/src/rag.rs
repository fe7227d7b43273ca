//! Retrieval domain types and capabilities.
//!
//! Documents are loaded into pages, chunked, embedded, and stored; at chat
//! time the retrieval augmentor searches the store and injects the
//! best-fitting passages into the draft context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::StoreError;

/// One page (or whole file) of a loaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedPage {
    /// Source path or label
    pub source: String,
    /// Page text
    pub text: String,
    /// 1-based page number, when the format has pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// A chunk of document text ready for embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Token cost of `text`, measured at indexing time
    #[serde(default)]
    pub tokens: usize,
}

impl DocumentChunk {
    /// Human-readable locator, e.g. `docs/intro.txt:p3`.
    pub fn locator(&self) -> String {
        match self.page {
            Some(p) => format!("{}:p{}", self.source, p),
            None => self.source.clone(),
        }
    }
}

/// Text → fixed-dimension embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding dimensionality.
    fn dim(&self) -> usize;

    /// Embed each text; one vector per input.
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, StoreError>;
}

/// Vector store over document chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace chunks (keyed by chunk id) with their vectors.
    async fn upsert(
        &self,
        chunks: &[DocumentChunk],
        vectors: &[Vec<f32>],
    ) -> std::result::Result<(), StoreError>;

    /// Ranked similarity search.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> std::result::Result<Vec<DocumentChunk>, StoreError>;

    /// Total stored chunk count.
    async fn count(&self) -> std::result::Result<usize, StoreError>;

    /// Remove every chunk from the given source. Returns the removed count.
    async fn delete_by_source(&self, source: &str) -> std::result::Result<usize, StoreError>;
}

/// Loads a document into pages (a single page for plain text).
pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> std::result::Result<Vec<LoadedPage>, StoreError>;
}

/// Cuts pages into chunks for indexing.
pub trait Chunker: Send + Sync {
    fn chunk(&self, pages: &[LoadedPage]) -> Vec<DocumentChunk>;
}
