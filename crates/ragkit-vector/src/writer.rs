use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use ragkit_core::traits::{Embedder, VectorIndex};
use ragkit_core::types::{DocumentChunk, IndexRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub total: usize,
    pub indexed: usize,
    /// Chunks skipped because an identical text was already seen in this pass.
    pub duplicates: usize,
    /// Rows of the ingested documents' previous versions that were removed.
    pub replaced: usize,
}

/// Embeds chunks and upserts them into a vector index in batches.
///
/// Each document present in the input replaces its previous version: old
/// rows for that `doc_id` are deleted before the new chunks are written.
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
    show_progress: bool,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index, batch_size: 256, show_progress: false }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, len: usize) -> Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
                .progress_chars("#>-"),
        );
        Ok(pb)
    }

    pub async fn ingest(&self, chunks: &[DocumentChunk]) -> Result<IngestReport> {
        let mut seen = HashSet::new();
        let unique: Vec<&DocumentChunk> = chunks
            .iter()
            .filter(|c| seen.insert(c.metadata.content_hash.as_str()))
            .collect();
        let mut report = IngestReport {
            total: chunks.len(),
            indexed: 0,
            duplicates: chunks.len() - unique.len(),
            replaced: 0,
        };

        let mut doc_ids = HashSet::new();
        for chunk in chunks {
            let doc_id = chunk.metadata.doc_id.as_str();
            if doc_ids.insert(doc_id) {
                report.replaced += self.index.delete_document(doc_id).await?;
            }
        }
        if report.replaced > 0 {
            debug!(rows = report.replaced, documents = doc_ids.len(), "removed previous document versions");
        }

        if unique.is_empty() {
            info!("no chunks to index");
            return Ok(report);
        }

        let pb = self.progress_bar(unique.len())?;
        for batch in unique.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.chunk.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;
            anyhow::ensure!(vectors.len() == batch.len(), "embedder returned {} vectors for {} texts", vectors.len(), batch.len());
            let records: Vec<IndexRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(c, vector)| IndexRecord {
                    id: c.id.clone(),
                    vector,
                    text: c.chunk.text.clone(),
                    metadata: c.metadata.clone(),
                })
                .collect();
            self.index.upsert_batch(records).await?;
            report.indexed += batch.len();
            pb.set_position(report.indexed as u64);
        }
        pb.finish_with_message("indexing completed");
        info!(indexed = report.indexed, duplicates = report.duplicates, embedder = %self.embedder.id(), "ingest finished");
        Ok(report)
    }
}
