use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{IndexHit, IndexRecord, RetrievalCandidate};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    /// Stable identity of the model, used to key cached vectors.
    fn id(&self) -> String;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, record: IndexRecord) -> Result<()>;

    async fn upsert_batch(&self, records: Vec<IndexRecord>) -> Result<()> {
        for record in records {
            self.upsert(record).await?;
        }
        Ok(())
    }

    /// Up to `k` hits ordered by ascending distance.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>>;

    /// Remove every record of `doc_id`. Returns the number removed.
    async fn delete_document(&self, doc_id: &str) -> Result<usize>;

    async fn count(&self) -> Result<usize>;
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Candidates ordered by ascending semantic distance. An empty result is
    /// a valid answer.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievalCandidate>>;
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, prompt: &str, temperature: f32, max_tokens: usize) -> Result<String>;
}

/// Out-of-process key/value store behind the L2 cache tier.
#[async_trait]
pub trait SharedCacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn ping(&self) -> bool;

    /// Drop expired entries. Returns the number removed.
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }
}
