//! LanceDB connection and housekeeping helpers.
use arrow_array::{Array, RecordBatchIterator};
use lancedb::{connect, Connection};
use std::sync::Arc;

use ragkit_core::{Error, Result};

pub(crate) fn storage<E: std::fmt::Display>(e: E) -> Error {
    Error::Storage(e.to_string())
}

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(storage)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    let names = conn.table_names().execute().await.map_err(storage)?;
    if names.contains(&name.to_string()) {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await.map_err(storage)?;
    Ok(())
}

/// Escape a string for use inside a single-quoted filter literal.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Downcast a named column, failing with a storage error when absent.
pub fn column<'a, T: Array + 'static>(batch: &'a arrow_array::RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::Storage(format!("column '{name}' missing or mistyped")))
}
