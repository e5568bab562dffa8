use arrow_array::{Int64Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;
use std::sync::Arc;
use std::time::Duration;

use ragkit_core::traits::SharedCacheStore;
use ragkit_core::Result;

use crate::schema::build_cache_schema;
use crate::table::{column, ensure_table, open_db, quote, storage};

/// Shared response cache stored in a LanceDB table.
///
/// Expiry uses wall-clock epoch millis since several processes may read the
/// same table. Expired rows read as absent; the health probe removes them
/// through `purge_expired`.
pub struct LanceCacheStore {
    conn: Connection,
    table_name: String,
}

impl LanceCacheStore {
    pub async fn open(uri: &str, table_name: &str) -> Result<Self> {
        let conn = open_db(uri).await?;
        ensure_table(&conn, table_name, build_cache_schema()).await?;
        Ok(Self { conn, table_name: table_name.to_string() })
    }

    async fn table(&self) -> Result<lancedb::Table> {
        self.conn.open_table(&self.table_name).execute().await.map_err(storage)
    }
}

#[async_trait]
impl SharedCacheStore for LanceCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let t = self.table().await?;
        let mut stream = t
            .query()
            .only_if(format!("key = {}", quote(key)))
            .execute()
            .await
            .map_err(storage)?;
        let now = Utc::now().timestamp_millis();
        while let Some(batch) = stream.try_next().await.map_err(storage)? {
            if batch.num_rows() == 0 {
                continue;
            }
            let values = column::<StringArray>(&batch, "value")?;
            let expires = column::<Int64Array>(&batch, "expires_at")?;
            if expires.value(0) > now {
                return Ok(Some(values.value(0).to_string()));
            }
            return Ok(None);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let rb = RecordBatch::try_new(
            build_cache_schema(),
            vec![
                Arc::new(StringArray::from(vec![key.to_string()])),
                Arc::new(StringArray::from(vec![value.to_string()])),
                Arc::new(Int64Array::from(vec![now.saturating_add(ttl_ms)])),
                Arc::new(TimestampMillisecondArray::from(vec![now])),
            ],
        )
        .map_err(storage)?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_cache_schema()));
        let t = self.table().await?;
        // key is unique: upsert through merge_insert
        let mut mi = t.merge_insert(&["key"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await.map_err(storage)?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        self.conn.table_names().execute().await.is_ok()
    }

    async fn purge_expired(&self) -> Result<usize> {
        let t = self.table().await?;
        let filter = format!("expires_at <= {}", Utc::now().timestamp_millis());
        let expired = t.count_rows(Some(filter.clone())).await.map_err(storage)?;
        if expired > 0 {
            t.delete(&filter).await.map_err(storage)?;
        }
        Ok(expired)
    }
}
