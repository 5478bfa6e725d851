use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use tracing::debug;

use super::{validate_identifier, Record, RemoteStore, StoreError};

/// Client for a PostgREST-style row gateway (`{base}/rest/v1/{table}`).
#[derive(Debug, Clone)]
pub struct RestStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.trim_end_matches('/').to_owned(),
                api_key: api_key.to_owned(),
            }),
        })
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("{}/rest/v1/{}", self.inner.base_url, path_and_query)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.inner.api_key)
            .bearer_auth(&self.inner.api_key)
    }

    /// GET a row listing and return its first row.
    async fn first_row(&self, path_and_query: &str) -> Result<Option<Record>, StoreError> {
        let url = self.url(path_and_query);
        debug!(url = %url, "Fetching rows");

        let response = self
            .authorized(self.inner.http.get(&url))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let rows: Vec<Record> = serde_json::from_slice(&bytes)?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    fn backend_name(&self) -> &str {
        "rest"
    }

    async fn fetch_latest(&self, collection: &str) -> Result<Option<Record>, StoreError> {
        self.first_row(&latest_query(collection)?).await
    }

    async fn fetch_by_id(&self, collection: &str, id: i64) -> Result<Option<Record>, StoreError> {
        self.first_row(&by_id_query(collection, id)?).await
    }

    async fn upsert(
        &self,
        collection: &str,
        record: Record,
        conflict_target: &str,
    ) -> Result<(), StoreError> {
        let url = self.url(&upsert_query(collection, conflict_target)?);
        debug!(url = %url, columns = record.len(), "Upserting row");

        let response = self
            .authorized(self.inner.http.post(&url))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&record)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Query builders
// ---------------------------------------------------------------------------

pub(crate) fn latest_query(collection: &str) -> Result<String, StoreError> {
    let table = validate_identifier(collection)?;
    Ok(format!("{table}?select=*&order=created_at.desc&limit=1"))
}

pub(crate) fn by_id_query(collection: &str, id: i64) -> Result<String, StoreError> {
    let table = validate_identifier(collection)?;
    Ok(format!("{table}?select=*&id=eq.{id}&limit=1"))
}

pub(crate) fn upsert_query(collection: &str, conflict_target: &str) -> Result<String, StoreError> {
    let table = validate_identifier(collection)?;
    let target = validate_identifier(conflict_target)?;
    Ok(format!("{table}?on_conflict={target}"))
}
