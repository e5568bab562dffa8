//! LanceDB-backed `VectorIndex`.
//!
//! Rows are upserted by `id` through `merge_insert`; the ingestor deletes a
//! document's old rows first so a shrunken document leaves nothing behind.
//! Queries use cosine distance.

use arrow_array::{
    types::Float32Type, FixedSizeListArray, Float32Array, Float64Array, Int32Array, RecordBatch,
    RecordBatchIterator, StringArray, TimestampMillisecondArray,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use std::sync::Arc;

use ragkit_core::traits::VectorIndex;
use ragkit_core::types::{ChunkMetadata, ContentType, IndexHit, IndexRecord, Section};
use ragkit_core::{Error, Result};

use crate::schema::build_documents_schema;
use crate::table::{column, ensure_table, open_db, quote, storage};

pub struct LanceVectorIndex {
    conn: Connection,
    table_name: String,
    dim: i32,
}

impl LanceVectorIndex {
    pub async fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
        let dim = i32::try_from(dim).map_err(|_| Error::config(format!("embedding dim {dim} too large")))?;
        let conn = open_db(uri).await?;
        ensure_table(&conn, table_name, build_documents_schema(dim)).await?;
        Ok(Self { conn, table_name: table_name.to_string(), dim })
    }

    async fn table(&self) -> Result<lancedb::Table> {
        self.conn.open_table(&self.table_name).execute().await.map_err(storage)
    }

    fn records_to_batch(&self, records: &[IndexRecord]) -> Result<RecordBatch> {
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(records.len());
        for r in records {
            if r.vector.len() != self.dim as usize {
                return Err(Error::Storage(format!(
                    "record '{}' has dim {}, index expects {}",
                    r.id,
                    r.vector.len(),
                    self.dim
                )));
            }
            vectors.push(Some(r.vector.iter().map(|&x| Some(x)).collect()));
        }
        let to_i32 = |v: usize| i32::try_from(v).unwrap_or(i32::MAX);
        let batch = RecordBatch::try_new(
            build_documents_schema(self.dim),
            vec![
                Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()))),
                Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.metadata.doc_id.as_str()))),
                Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.text.as_str()))),
                Arc::new(Int32Array::from_iter_values(records.iter().map(|r| to_i32(r.metadata.chunk_index)))),
                Arc::new(Int32Array::from_iter_values(records.iter().map(|r| to_i32(r.metadata.total_chunks)))),
                Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.metadata.section.as_str()))),
                Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.metadata.content_type.as_str()))),
                Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.metadata.content_hash.as_str()))),
                Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.metadata.completeness_score))),
                Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.metadata.info_density_score))),
                Arc::new(TimestampMillisecondArray::from_iter_values(
                    records.iter().map(|r| r.metadata.indexed_at.timestamp_millis()),
                )),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, self.dim)),
            ],
        )
        .map_err(storage)?;
        Ok(batch)
    }
}

fn batch_to_hits(batch: &RecordBatch, out: &mut Vec<IndexHit>) -> Result<()> {
    let ids = column::<StringArray>(batch, "id")?;
    let doc_ids = column::<StringArray>(batch, "doc_id")?;
    let contents = column::<StringArray>(batch, "content")?;
    let chunk_indices = column::<Int32Array>(batch, "chunk_index")?;
    let totals = column::<Int32Array>(batch, "total_chunks")?;
    let sections = column::<StringArray>(batch, "section")?;
    let content_types = column::<StringArray>(batch, "content_type")?;
    let hashes = column::<StringArray>(batch, "content_hash")?;
    let completeness = column::<Float64Array>(batch, "completeness")?;
    let density = column::<Float64Array>(batch, "info_density")?;
    let indexed_at = column::<TimestampMillisecondArray>(batch, "indexed_at")?;
    let distances = column::<Float32Array>(batch, "_distance")?;

    for i in 0..batch.num_rows() {
        let metadata = ChunkMetadata {
            doc_id: doc_ids.value(i).to_string(),
            chunk_index: usize::try_from(chunk_indices.value(i)).unwrap_or_default(),
            total_chunks: usize::try_from(totals.value(i)).unwrap_or_default(),
            section: Section::parse(sections.value(i)).unwrap_or(Section::General),
            content_type: ContentType::parse(content_types.value(i)).unwrap_or(ContentType::Mixed),
            content_hash: hashes.value(i).to_string(),
            completeness_score: completeness.value(i),
            info_density_score: density.value(i),
            indexed_at: DateTime::<Utc>::from_timestamp_millis(indexed_at.value(i)).unwrap_or_default(),
        };
        out.push(IndexHit {
            id: ids.value(i).to_string(),
            distance: distances.value(i),
            text: contents.value(i).to_string(),
            metadata,
        });
    }
    Ok(())
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn upsert(&self, record: IndexRecord) -> Result<()> {
        self.upsert_batch(vec![record]).await
    }

    async fn upsert_batch(&self, records: Vec<IndexRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let batch = self.records_to_batch(&records)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let t = self.table().await?;
        let mut mi = t.merge_insert(&["id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await.map_err(storage)?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        let t = self.table().await?;
        if k == 0 || t.count_rows(None).await.map_err(storage)? == 0 {
            return Ok(Vec::new());
        }
        let mut stream = t
            .vector_search(vector.to_vec())
            .map_err(storage)?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(storage)?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(storage)? {
            batch_to_hits(&batch, &mut hits)?;
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(hits)
    }

    async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        let t = self.table().await?;
        let filter = format!("doc_id = {}", quote(doc_id));
        let before = t.count_rows(Some(filter.clone())).await.map_err(storage)?;
        if before > 0 {
            t.delete(&filter).await.map_err(storage)?;
        }
        Ok(before)
    }

    async fn count(&self) -> Result<usize> {
        self.table().await?.count_rows(None).await.map_err(storage)
    }
}
