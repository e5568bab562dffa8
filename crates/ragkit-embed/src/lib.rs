//! Embedding providers and vector similarity helpers.

use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

pub use ragkit_core::traits::Embedder;

pub mod similarity;

pub const DEFAULT_DIM: usize = 384;

/// Hashed bag-of-words embedder.
///
/// Each lowercased token is hashed into one of `dim` buckets and the result
/// is L2-normalized, so texts sharing vocabulary land close together. Needs
/// no model files and is fully deterministic.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            #[allow(clippy::cast_possible_truncation)]
            let idx = (h % self.dim as u64) as usize;
            #[allow(clippy::cast_precision_loss)]
            let weight = 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += weight;
        }
        similarity::l2_normalize(&mut v);
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn id(&self) -> String {
        format!("hash-bow-{}", self.dim)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Embedder selected by `APP_EMBED_DIM` (defaults to `DEFAULT_DIM`).
pub fn get_default_embedder() -> Box<dyn Embedder> {
    let dim = std::env::var("APP_EMBED_DIM")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|d| *d > 0)
        .unwrap_or(DEFAULT_DIM);
    tracing::debug!(dim, "using hashed bag-of-words embedder");
    Box::new(HashEmbedder::new(dim))
}
