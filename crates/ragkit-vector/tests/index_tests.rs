use std::sync::Arc;

use ragkit_core::config::ChunkingConfig;
use ragkit_core::data_processor::DataProcessor;
use ragkit_core::traits::{Retriever, VectorIndex};
use ragkit_core::types::{DocumentChunk, Section};
use ragkit_embed::{Embedder, HashEmbedder};
use ragkit_vector::{InMemoryIndex, Ingestor, VectorRetriever};

fn processor() -> DataProcessor {
    DataProcessor::new(&ChunkingConfig { chunk_size: 120, overlap: 20, min_chunk_len: 10, ..ChunkingConfig::default() })
        .expect("processor")
}

fn handbook_chunks() -> Vec<DocumentChunk> {
    let processor = processor();
    let text = "Employees get 22 vacation days per year. Vacation requests go through the HR portal.\n\n\
                Remote work is allowed three days per week. Managers approve remote schedules.\n\n\
                Install the VPN client before travelling. The IT desk configures laptops on day one.";
    processor.process_text("handbook", "handbook.txt", text)
}

#[tokio::test]
async fn ingest_then_retrieve_in_memory() -> anyhow::Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
    let index = Arc::new(InMemoryIndex::new());
    let chunks = handbook_chunks();

    let report = Ingestor::new(embedder.clone(), index.clone()).with_batch_size(2).ingest(&chunks).await?;
    assert_eq!(report.indexed, chunks.len());
    assert_eq!(report.duplicates, 0);
    assert_eq!(index.count().await?, chunks.len());

    let retriever = VectorRetriever::new(embedder, index);
    let candidates = retriever.similarity_search("how many vacation days do employees get", 2).await?;
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].metadata.section, Section::Vacation);
    assert!(candidates[0].semantic_distance <= candidates[1].semantic_distance);
    Ok(())
}

#[tokio::test]
async fn duplicate_texts_are_indexed_once() -> anyhow::Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
    let index = Arc::new(InMemoryIndex::new());
    let mut chunks = handbook_chunks();
    let mut copy = chunks[0].clone();
    copy.id = "copy:0".to_string();
    chunks.push(copy);

    let report = Ingestor::new(embedder, index.clone()).ingest(&chunks).await?;
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.indexed, chunks.len() - 1);
    assert_eq!(index.count().await?, chunks.len() - 1);
    Ok(())
}

#[tokio::test]
async fn reingest_replaces_by_id() -> anyhow::Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
    let index = Arc::new(InMemoryIndex::new());
    let chunks = handbook_chunks();
    let ingestor = Ingestor::new(embedder, index.clone());
    ingestor.ingest(&chunks).await?;
    ingestor.ingest(&chunks).await?;
    assert_eq!(index.count().await?, chunks.len());
    Ok(())
}

#[tokio::test]
async fn reingesting_a_shrunken_document_drops_stale_chunks() -> anyhow::Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
    let index = Arc::new(InMemoryIndex::new());
    let ingestor = Ingestor::new(embedder.clone(), index.clone());
    let v1 = handbook_chunks();
    assert!(v1.len() > 1, "fixture spans several chunks");
    ingestor.ingest(&v1).await?;

    let v2 = processor().process_text("handbook", "handbook.txt", "Employees get 25 vacation days per year.");
    assert_eq!(v2.len(), 1);
    let report = ingestor.ingest(&v2).await?;
    assert_eq!(report.replaced, v1.len());
    assert_eq!(index.count().await?, 1);

    let retriever = VectorRetriever::new(embedder, index);
    let hits = retriever.similarity_search("install the VPN client", 5).await?;
    assert_eq!(hits.len(), 1);
    assert!(hits[0].chunk_text.contains("25 vacation days"));
    Ok(())
}

#[tokio::test]
async fn reingest_leaves_other_documents_alone() -> anyhow::Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
    let index = Arc::new(InMemoryIndex::new());
    let ingestor = Ingestor::new(embedder, index.clone());
    ingestor.ingest(&handbook_chunks()).await?;
    let before = index.count().await?;

    let other = processor().process_text("benefits", "benefits.txt", "Dental coverage starts after 90 days.");
    assert_eq!(other.len(), 1);
    let report = ingestor.ingest(&other).await?;
    assert_eq!(report.replaced, 0);
    assert_eq!(index.count().await?, before + other.len());
    Ok(())
}

#[tokio::test]
async fn empty_index_returns_no_candidates() -> anyhow::Result<()> {
    let retriever = VectorRetriever::new(Arc::new(HashEmbedder::new(32)), Arc::new(InMemoryIndex::new()));
    assert!(retriever.similarity_search("anything", 5).await?.is_empty());
    Ok(())
}
