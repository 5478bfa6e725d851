use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use super::{RemoteStore, Record, StoreError};

/// Rows kept in process memory, one `Vec` per collection in insertion order.
///
/// Cheap to clone; clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row without any conflict handling.
    pub async fn insert(&self, collection: &str, record: Record) {
        self.inner
            .write()
            .await
            .entry(collection.to_owned())
            .or_default()
            .push(record);
    }

    /// Snapshot of every row in `collection`.
    pub async fn rows(&self, collection: &str) -> Vec<Record> {
        self.inner
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

fn created_at(record: &Record) -> Option<DateTime<Utc>> {
    record
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn fetch_latest(&self, collection: &str) -> Result<Option<Record>, StoreError> {
        let guard = self.inner.read().await;
        let Some(rows) = guard.get(collection) else {
            return Ok(None);
        };
        // `max_by_key` keeps the last maximum, so insertion order breaks ties.
        Ok(rows.iter().max_by_key(|r| created_at(r)).cloned())
    }

    async fn fetch_by_id(&self, collection: &str, id: i64) -> Result<Option<Record>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .get(collection)
            .and_then(|rows| {
                rows.iter()
                    .find(|r| r.get("id").and_then(Value::as_i64) == Some(id))
            })
            .cloned())
    }

    async fn upsert(
        &self,
        collection: &str,
        record: Record,
        conflict_target: &str,
    ) -> Result<(), StoreError> {
        let key = record.get(conflict_target).cloned().ok_or_else(|| {
            StoreError::Rejected(format!("record has no {conflict_target:?} column"))
        })?;

        let mut guard = self.inner.write().await;
        let rows = guard.entry(collection.to_owned()).or_default();
        match rows.iter_mut().find(|r| r.get(conflict_target) == Some(&key)) {
            Some(existing) => existing.extend(record),
            None => rows.push(record),
        }
        Ok(())
    }
}
