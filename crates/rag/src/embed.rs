//! Hashing embedder — deterministic, offline, zero-model.
//!
//! Each word hashes to one signed bucket of a fixed-dimension vector; the
//! result is L2-normalized so dot product equals cosine similarity. Crude
//! but deterministic, which makes retrieval testable without a model
//! download, and good enough for keyword-ish queries.

use async_trait::async_trait;
use packrat_core::error::StoreError;
use packrat_core::rag::Embedder;
use sha2::{Digest, Sha256};

/// Default embedding dimensionality.
pub const DEFAULT_DIM: usize = 256;

/// Signed bag-of-words hashing embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dim];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let idx = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
                % self.dim;
            let sign = if digest[4] & 1 == 1 { 1.0 } else { -1.0 };
            vec[idx] += sign;
        }
        l2_normalize(vec)
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

fn l2_normalize(vec: Vec<f32>) -> Vec<f32> {
    let norm = vec.iter().map(|v| (*v as f64) * (*v as f64)).sum::<f64>().sqrt();
    if norm <= 0.0 {
        return vec;
    }
    vec.into_iter().map(|v| (v as f64 / norm) as f32).collect()
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, StoreError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
