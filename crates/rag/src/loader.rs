//! Document loaders.
//!
//! Plain-text formats only (.txt, .md) — one `LoadedPage` per file. The
//! loader trait keeps the seam open for paged formats.

use std::path::Path;

use packrat_core::error::StoreError;
use packrat_core::rag::{DocumentLoader, LoadedPage};

/// Loads a UTF-8 (lossy) text file as a single page.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn load(&self, path: &Path) -> std::result::Result<Vec<LoadedPage>, StoreError> {
        let bytes = std::fs::read(path)
            .map_err(|e| StoreError::Storage(format!("Failed to read {}: {e}", path.display())))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(vec![LoadedPage {
            source: path.display().to_string(),
            text,
            page: None,
        }])
    }
}
