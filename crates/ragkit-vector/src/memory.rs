use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use ragkit_core::traits::VectorIndex;
use ragkit_core::types::{IndexHit, IndexRecord};
use ragkit_core::Result;
use ragkit_embed::similarity::cosine_distance;

/// Brute-force cosine index held in memory.
///
/// Records are kept ordered by id so equal distances come back in a stable
/// order.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    records: RwLock<BTreeMap<String, IndexRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, record: IndexRecord) -> Result<()> {
        self.records.write().insert(record.id.clone(), record);
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        let records = self.records.read();
        let mut hits: Vec<IndexHit> = records
            .values()
            .map(|r| IndexHit {
                id: r.id.clone(),
                distance: cosine_distance(vector, &r.vector),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| r.metadata.doc_id != doc_id);
        Ok(before - records.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }
}
