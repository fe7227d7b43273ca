//! Document ingestion: load → chunk → embed → store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use packrat_core::error::StoreError;
use packrat_core::rag::{Chunker, DocumentChunk, DocumentLoader, Embedder, VectorStore};
use tracing::info;

/// Ingests documents into the vector store, picking a loader by file
/// extension.
pub struct DocIndexer {
    loaders: HashMap<String, Arc<dyn DocumentLoader>>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl DocIndexer {
    pub fn new(
        loaders: HashMap<String, Arc<dyn DocumentLoader>>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            loaders,
            chunker,
            embedder,
            store,
        }
    }

    /// Ingest every path; returns the number of chunks stored.
    pub async fn ingest_paths(
        &self,
        paths: &[impl AsRef<Path>],
    ) -> std::result::Result<usize, StoreError> {
        let mut all_chunks: Vec<DocumentChunk> = Vec::new();

        for path in paths {
            let path = path.as_ref();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_lowercase();
            let loader = self.loaders.get(&ext).ok_or_else(|| {
                StoreError::UnsupportedDocument(format!(
                    "no loader for extension .{ext} (path={})",
                    path.display()
                ))
            })?;

            let pages = loader.load(path)?;
            all_chunks.extend(self.chunker.chunk(&pages));
        }

        if all_chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = all_chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        if vectors.len() != all_chunks.len() {
            return Err(StoreError::Embedding(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                all_chunks.len()
            )));
        }
        let dim = self.embedder.dim();
        if dim > 0 {
            for v in &vectors {
                if v.len() != dim {
                    return Err(StoreError::Embedding(format!(
                        "vector dim mismatch: got {} expected {dim}",
                        v.len()
                    )));
                }
            }
        }

        self.store.upsert(&all_chunks, &vectors).await?;
        info!(chunks = all_chunks.len(), "Ingested documents");
        Ok(all_chunks.len())
    }
}
