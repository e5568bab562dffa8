use async_trait::async_trait;
use std::sync::Arc;

use ragkit_core::traits::{Embedder, Retriever, VectorIndex};
use ragkit_core::types::RetrievalCandidate;
use ragkit_core::{Error, FailureKind, Result, Service};

/// Embeds the query and asks a `VectorIndex` for its nearest chunks.
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievalCandidate>> {
        let vector = self
            .embedder
            .embed(query)
            .map_err(|e| Error::failure(Service::Retrieval, FailureKind::Unavailable, format!("embedding failed: {e}")))?;
        let hits = self.index.query(&vector, k).await.map_err(|e| match e {
            Error::Storage(msg) => Error::failure(Service::Retrieval, FailureKind::Unavailable, msg),
            other => other,
        })?;
        Ok(hits.into_iter().map(RetrievalCandidate::from).collect())
    }
}
