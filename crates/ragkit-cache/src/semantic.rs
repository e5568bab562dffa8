use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ragkit_core::clock::Clock;
use ragkit_core::traits::Embedder;
use ragkit_embed::similarity::cosine_similarity;

struct Entry {
    context: String,
    vector: Vec<f32>,
    value: String,
    inserted_at: Instant,
    ttl: Duration,
}

/// Approximate cache keyed by query embeddings.
///
/// Holds at most `capacity` entries, dropping the oldest first. Lookups only
/// consider entries stored under the same key context.
pub struct SemanticCache {
    embedder: Arc<dyn Embedder>,
    entries: Mutex<VecDeque<Entry>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl SemanticCache {
    pub fn new(embedder: Arc<dyn Embedder>, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self { embedder, entries: Mutex::new(VecDeque::new()), capacity: capacity.max(1), clock }
    }

    /// Best stored value whose query similarity is at least `threshold`.
    pub fn lookup_similar(&self, context: &str, query: &str, threshold: f32) -> Option<String> {
        let vector = match self.embedder.embed(query) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "semantic cache embedding failed");
                return None;
            }
        };
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        entries.retain(|e| now.saturating_duration_since(e.inserted_at) < e.ttl);
        entries
            .iter()
            .filter(|e| e.context == context)
            .map(|e| (cosine_similarity(&vector, &e.vector), e))
            .filter(|(sim, _)| *sim >= threshold)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(sim, e)| {
                tracing::debug!(similarity = sim, "semantic cache hit");
                e.value.clone()
            })
    }

    pub fn insert(&self, context: &str, query: &str, value: &str, ttl: Duration) {
        let vector = match self.embedder.embed(query) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "semantic cache embedding failed");
                return;
            }
        };
        let mut entries = self.entries.lock();
        entries.push_back(Entry {
            context: context.to_string(),
            vector,
            value: value.to_string(),
            inserted_at: self.clock.now(),
            ttl,
        });
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
