//! Arrow schemas for the LanceDB tables.
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub fn build_documents_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("doc_id", DataType::Utf8, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("chunk_index", DataType::Int32, false),
		Field::new("total_chunks", DataType::Int32, false),
		Field::new("section", DataType::Utf8, false),
		Field::new("content_type", DataType::Utf8, false),
		Field::new("content_hash", DataType::Utf8, false),
		Field::new("completeness", DataType::Float64, false),
		Field::new("info_density", DataType::Float64, false),
		Field::new("indexed_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// Key/value rows for the shared response cache. `expires_at` is epoch millis.
pub fn build_cache_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("expires_at", DataType::Int64, false),
		Field::new("created_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
	]))
}
