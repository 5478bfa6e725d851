//! Store double with injectable delays and failures.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::time;

use super::{MemoryStore, Record, RemoteStore, StoreError};

/// Wraps a [`MemoryStore`]. Scripted fetch responses for a collection are
/// consumed first, in order; once exhausted, calls fall through to memory.
#[derive(Debug, Default)]
pub(crate) struct ScriptedStore {
    memory: MemoryStore,
    scripted: Mutex<HashMap<String, VecDeque<(Duration, Option<Record>)>>>,
    failing: Mutex<HashSet<String>>,
    fail_upserts: AtomicBool,
    upsert_delay: Mutex<Duration>,
    upserts: Mutex<Vec<(String, Record)>>,
}

impl ScriptedStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn row(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("test row must be an object, got {other}"),
        }
    }

    pub(crate) fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Next fetch on `collection` waits `delay`, then returns `record`.
    pub(crate) fn script_fetch(&self, collection: &str, delay: Duration, record: Option<Record>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(collection.to_owned())
            .or_default()
            .push_back((delay, record));
    }

    pub(crate) fn fail_fetches(&self, collection: &str) {
        self.failing.lock().unwrap().insert(collection.to_owned());
    }

    pub(crate) fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn delay_upserts(&self, delay: Duration) {
        *self.upsert_delay.lock().unwrap() = delay;
    }

    /// Every upsert attempted, successful or not.
    pub(crate) fn upserts(&self) -> Vec<(String, Record)> {
        self.upserts.lock().unwrap().clone()
    }

    async fn scripted_or_failed(&self, collection: &str) -> Option<Result<Option<Record>, StoreError>> {
        let next = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(collection)
            .and_then(VecDeque::pop_front);
        if let Some((delay, record)) = next {
            time::sleep(delay).await;
            return Some(Ok(record));
        }
        if self.failing.lock().unwrap().contains(collection) {
            return Some(Err(StoreError::Status {
                status: 503,
                body: "unavailable".to_owned(),
            }));
        }
        None
    }
}

#[async_trait]
impl RemoteStore for ScriptedStore {
    fn backend_name(&self) -> &str {
        "scripted"
    }

    async fn fetch_latest(&self, collection: &str) -> Result<Option<Record>, StoreError> {
        match self.scripted_or_failed(collection).await {
            Some(result) => result,
            None => self.memory.fetch_latest(collection).await,
        }
    }

    async fn fetch_by_id(&self, collection: &str, id: i64) -> Result<Option<Record>, StoreError> {
        match self.scripted_or_failed(collection).await {
            Some(result) => result,
            None => self.memory.fetch_by_id(collection, id).await,
        }
    }

    async fn upsert(
        &self,
        collection: &str,
        record: Record,
        conflict_target: &str,
    ) -> Result<(), StoreError> {
        self.upserts
            .lock()
            .unwrap()
            .push((collection.to_owned(), record.clone()));

        let delay = *self.upsert_delay.lock().unwrap();
        if !delay.is_zero() {
            time::sleep(delay).await;
        }
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("network unreachable".to_owned()));
        }
        self.memory.upsert(collection, record, conflict_target).await
    }
}
