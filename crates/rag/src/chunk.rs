//! Character-window chunker with token-budget sizing.
//!
//! Window and overlap are configured in tokens and converted with the
//! 4-chars/token heuristic; cuts prefer the last space inside the window
//! so chunks end on word boundaries where possible.

use std::sync::Arc;

use packrat_core::rag::{Chunker, DocumentChunk, LoadedPage};
use packrat_core::tokens::TokenCounter;
use uuid::Uuid;

/// Default chunk size in tokens.
pub const DEFAULT_CHUNK_TOKENS: usize = 800;
/// Default overlap between consecutive chunks, in tokens.
pub const DEFAULT_OVERLAP_TOKENS: usize = 120;

/// Cuts pages into overlapping character windows.
pub struct CharChunker {
    counter: Arc<dyn TokenCounter>,
    chunk_tokens: usize,
    overlap_tokens: usize,
}

impl CharChunker {
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            counter,
            chunk_tokens: DEFAULT_CHUNK_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
        }
    }

    pub fn with_sizes(mut self, chunk_tokens: usize, overlap_tokens: usize) -> Self {
        self.chunk_tokens = chunk_tokens;
        self.overlap_tokens = overlap_tokens;
        self
    }
}

impl Chunker for CharChunker {
    fn chunk(&self, pages: &[LoadedPage]) -> Vec<DocumentChunk> {
        let max_chars = (self.chunk_tokens * 4).max(200);
        let overlap_chars = (self.overlap_tokens * 4).min(max_chars - 1);

        let mut chunks = Vec::new();

        for page in pages {
            let text: Vec<char> = page.text.trim().chars().collect();
            if text.is_empty() {
                continue;
            }

            let n = text.len();
            let mut pos = 0;

            while pos < n {
                let mut end = (pos + max_chars).min(n);

                // Prefer a word boundary, but never produce a tiny sliver.
                if end < n
                    && let Some(cut) = text[pos..end].iter().rposition(|c| *c == ' ')
                    && cut > 50
                {
                    end = pos + cut;
                }

                let chunk_text: String = text[pos..end].iter().collect();
                let chunk_text = chunk_text.trim().to_string();
                if !chunk_text.is_empty() {
                    let tokens = self.counter.count_text(&chunk_text);
                    chunks.push(DocumentChunk {
                        id: Uuid::new_v4().simple().to_string(),
                        text: chunk_text,
                        source: page.source.clone(),
                        page: page.page,
                        tokens,
                    });
                }

                if end >= n {
                    break;
                }
                // Overlap, but always advance.
                pos = end.saturating_sub(overlap_chars).max(pos + 1);
            }
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packrat_context::ApproxTokenCounter;

    fn page(text: &str) -> LoadedPage {
        LoadedPage {
            source: "doc.txt".into(),
            text: text.into(),
            page: None,
        }
    }

    fn chunker(chunk_tokens: usize, overlap_tokens: usize) -> CharChunker {
        CharChunker::new(Arc::new(ApproxTokenCounter::default()))
            .with_sizes(chunk_tokens, overlap_tokens)
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunker(80, 10).chunk(&[page("France capital is Paris.")]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "France capital is Paris.");
        assert!(chunks[0].tokens > 0);
    }

    #[test]
    fn long_text_splits_with_overlap() {
        let long = "word ".repeat(400); // 2000 chars
        let chunks = chunker(100, 10).chunk(&[page(&long)]);
        assert!(chunks.len() > 1);
        // every chunk respects the window (400 chars for 100 tokens)
        for ch in &chunks {
            assert!(ch.text.chars().count() <= 400);
        }
    }

    #[test]
    fn cuts_on_word_boundary() {
        let long = "word ".repeat(400);
        let chunks = chunker(100, 10).chunk(&[page(&long)]);
        assert!(chunks[0].text.ends_with("word"));
    }

    #[test]
    fn blank_pages_are_skipped() {
        let chunks = chunker(80, 10).chunk(&[page("   \n  "), page("content")]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "content");
    }

    #[test]
    fn page_number_carried_onto_chunks() {
        let p = LoadedPage {
            source: "book.txt".into(),
            text: "some page text".into(),
            page: Some(7),
        };
        let chunks = chunker(80, 10).chunk(&[p]);
        assert_eq!(chunks[0].page, Some(7));
    }
}
