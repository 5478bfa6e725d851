//! Remote row store abstraction.
//!
//! - [`RestStore`]: PostgREST-style HTTP gateway (default)
//! - [`PgStore`]: direct Postgres connection via sqlx
//! - [`MemoryStore`]: in-process rows for local development
//!
//! Records cross this boundary as JSON objects; typed decoding happens in
//! the reconciler so every backend stays schema-agnostic.

pub mod memory;
pub mod postgres;
pub mod rest;

#[cfg(test)]
pub(crate) mod testing;

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::time;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use rest::RestStore;

/// One row as returned by the store.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to decode record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Collections (tables) the dashboard reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    /// Append-only sensor log
    pub sensors: String,
    /// Holds the singleton control row
    pub controls: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            sensors: "sensor_data".to_owned(),
            controls: "controls".to_owned(),
        }
    }
}

/// Request/response access to a remote key-record store.
///
/// Every call is a suspension point; implementations hold no view state.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Human-readable backend name (e.g. "rest", "postgres").
    fn backend_name(&self) -> &str;

    /// Most recent row of `collection` by `created_at` descending, or `None`
    /// when the collection is empty.
    async fn fetch_latest(&self, collection: &str) -> Result<Option<Record>, StoreError>;

    /// The row whose `id` equals `id`, or `None`.
    async fn fetch_by_id(&self, collection: &str, id: i64) -> Result<Option<Record>, StoreError>;

    /// Insert `record`, or merge its columns into the existing row that shares
    /// the value of `conflict_target`.
    async fn upsert(
        &self,
        collection: &str,
        record: Record,
        conflict_target: &str,
    ) -> Result<(), StoreError>;
}

/// Bound a store call by `limit`; expiry maps to [`StoreError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

/// Decode an optional row into a typed record.
pub fn decode<T: DeserializeOwned>(record: Option<Record>) -> Result<Option<T>, StoreError> {
    record
        .map(|r| serde_json::from_value(Value::Object(r)))
        .transpose()
        .map_err(StoreError::from)
}

/// Serialise a typed record into a row.
pub fn encode<T: serde::Serialize>(value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Rejected(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Table and column names are interpolated into queries, so only plain
/// identifiers are accepted.
pub(crate) fn validate_identifier(name: &str) -> Result<&str, StoreError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.len() <= 63;
    if valid {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_owned()))
    }
}
