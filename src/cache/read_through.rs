//! Read-through query cache orchestration.
//!
//! [`QueryCache`] sits between a caller and two collaborators: a
//! [`RelationalExecutor`] that owns the truth and a [`KeyValueStore`] that
//! only ever makes things faster. The contract is strictly fail-open: a
//! miss, a corrupt entry, or any store failure falls back to the executor,
//! and only executor errors reach the caller.
//!
//! Nothing here de-duplicates concurrent identical queries: two racing
//! misses both execute and both write, last writer wins.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::db::{ExecutorError, Query, RelationalExecutor};
use crate::row::Row;
use crate::store::{KeyValueStore, StoreConnection, StoreError};

use super::events::{CacheEvent, EventSink, TelemetrySink};
use super::key::derive_key;

pub struct QueryCache<S> {
    store: Option<S>,
    events: Arc<dyn EventSink>,
}

impl<S: KeyValueStore> QueryCache<S> {
    /// Cache reads through the given store.
    pub fn new(store: S) -> Self {
        Self {
            store: Some(store),
            events: Arc::new(TelemetrySink),
        }
    }

    /// Caching disabled: every call goes straight to the executor, with no
    /// store interaction at all.
    pub fn disabled() -> Self {
        Self {
            store: None,
            events: Arc::new(TelemetrySink),
        }
    }

    /// Replace the default telemetry sink with a custom event observer.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Fetch the first row of `query`, serving it from the store when a
    /// valid entry exists and repopulating the store otherwise.
    ///
    /// An empty row (no rows matched) is returned as-is and never cached.
    pub async fn fetch_row<E: RelationalExecutor>(
        &self,
        executor: &E,
        query: &Query,
        ttl: Duration,
    ) -> Result<Row, ExecutorError> {
        let Some(store) = self.store.as_ref() else {
            return executor.fetch_row(query).await;
        };

        let mut conn = match store.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                self.events.publish(CacheEvent::StoreUnavailable {
                    message: err.to_string(),
                });
                return executor.fetch_row(query).await;
            }
        };

        let key = derive_key(query);
        if let Some(row) = self.read_entry::<Row>(&mut conn, &key).await {
            return Ok(row);
        }

        let row = executor.fetch_row(query).await?;
        if !row.is_empty() {
            self.write_entry(&mut conn, &key, &row, ttl).await;
        }
        Ok(row)
    }

    /// Multi-row variant of [`QueryCache::fetch_row`]. An empty result set
    /// is returned as-is and never cached.
    pub async fn fetch_rows<E: RelationalExecutor>(
        &self,
        executor: &E,
        query: &Query,
        ttl: Duration,
    ) -> Result<Vec<Row>, ExecutorError> {
        let Some(store) = self.store.as_ref() else {
            return executor.fetch_rows(query).await;
        };

        let mut conn = match store.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                self.events.publish(CacheEvent::StoreUnavailable {
                    message: err.to_string(),
                });
                return executor.fetch_rows(query).await;
            }
        };

        let key = derive_key(query);
        if let Some(rows) = self.read_entry::<Vec<Row>>(&mut conn, &key).await {
            return Ok(rows);
        }

        let rows = executor.fetch_rows(query).await?;
        if !rows.is_empty() {
            self.write_entry(&mut conn, &key, &rows, ttl).await;
        }
        Ok(rows)
    }

    /// Attempt a cache read. Returns the decoded value on a clean hit and
    /// `None` on miss, store failure, or corrupt payload; the corresponding
    /// event is published in every case.
    async fn read_entry<T: DeserializeOwned>(&self, conn: &mut S::Conn, key: &str) -> Option<T> {
        match conn.get(key).await {
            Ok(payload) => match serde_json::from_str::<T>(&payload) {
                Ok(value) => {
                    self.events.publish(CacheEvent::Hit {
                        key: key.to_string(),
                    });
                    Some(value)
                }
                Err(err) => {
                    self.events.publish(CacheEvent::DecodeFailed {
                        key: key.to_string(),
                        message: err.to_string(),
                    });
                    None
                }
            },
            Err(StoreError::NotFound) => {
                self.events.publish(CacheEvent::Miss {
                    key: key.to_string(),
                });
                None
            }
            Err(err) => {
                self.events.publish(CacheEvent::StoreUnavailable {
                    message: err.to_string(),
                });
                None
            }
        }
    }

    /// Best-effort cache write; failures are published and swallowed.
    async fn write_entry<T: Serialize>(
        &self,
        conn: &mut S::Conn,
        key: &str,
        value: &T,
        ttl: Duration,
    ) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                self.events.publish(CacheEvent::EncodeFailed {
                    key: key.to_string(),
                    message: err.to_string(),
                });
                return;
            }
        };

        if let Err(err) = conn.set(key, &payload, ttl).await {
            self.events.publish(CacheEvent::WriteFailed {
                key: key.to_string(),
                message: err.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::cache::events::RecordingSink;
    use crate::row::CellValue;
    use crate::store::TTL_5S;

    use super::*;

    // ------------------------------------------------------------------
    // In-memory store fake
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct MemoryStore {
        entries: Arc<Mutex<HashMap<String, String>>>,
        fail_acquire: bool,
        fail_get: bool,
        fail_set: bool,
    }

    impl MemoryStore {
        fn entries(&self) -> HashMap<String, String> {
            self.entries.lock().expect("entries lock").clone()
        }

        fn preload(&self, key: &str, payload: &str) {
            self.entries
                .lock()
                .expect("entries lock")
                .insert(key.to_string(), payload.to_string());
        }
    }

    struct MemoryConn {
        entries: Arc<Mutex<HashMap<String, String>>>,
        fail_get: bool,
        fail_set: bool,
    }

    #[async_trait]
    impl KeyValueStore for MemoryStore {
        type Conn = MemoryConn;

        async fn acquire(&self) -> Result<MemoryConn, StoreError> {
            if self.fail_acquire {
                return Err(StoreError::unavailable("connection refused"));
            }
            Ok(MemoryConn {
                entries: Arc::clone(&self.entries),
                fail_get: self.fail_get,
                fail_set: self.fail_set,
            })
        }
    }

    #[async_trait]
    impl StoreConnection for MemoryConn {
        async fn get(&mut self, key: &str) -> Result<String, StoreError> {
            if self.fail_get {
                return Err(StoreError::unavailable("read timeout"));
            }
            self.entries
                .lock()
                .expect("entries lock")
                .get(key)
                .cloned()
                .ok_or(StoreError::NotFound)
        }

        async fn set(&mut self, key: &str, value: &str, _ttl: Duration) -> Result<(), StoreError> {
            if self.fail_set {
                return Err(StoreError::unavailable("write timeout"));
            }
            self.entries
                .lock()
                .expect("entries lock")
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn del(&mut self, key: &str) -> Result<(), StoreError> {
            self.entries.lock().expect("entries lock").remove(key);
            Ok(())
        }

        async fn del_many(&mut self, keys: &[String]) -> Result<(), StoreError> {
            let mut entries = self.entries.lock().expect("entries lock");
            for key in keys {
                entries.remove(key);
            }
            Ok(())
        }

        async fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
            Ok(self.entries.lock().expect("entries lock").contains_key(key))
        }

        async fn scan(&mut self, pattern: &str) -> Result<Vec<String>, StoreError> {
            let prefix = pattern.trim_end_matches('*');
            Ok(self
                .entries
                .lock()
                .expect("entries lock")
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect())
        }
    }

    // ------------------------------------------------------------------
    // Executor fake
    // ------------------------------------------------------------------

    struct FakeExecutor {
        row: Row,
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeExecutor {
        fn returning(row: Row) -> Self {
            Self {
                row,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                row: Row::new(),
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn empty() -> Self {
            Self::returning(Row::new())
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RelationalExecutor for FakeExecutor {
        async fn fetch_row(&self, _query: &Query) -> Result<Row, ExecutorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ExecutorError::query("relation does not exist"));
            }
            Ok(self.row.clone())
        }

        async fn fetch_rows(&self, _query: &Query) -> Result<Vec<Row>, ExecutorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ExecutorError::query("relation does not exist"));
            }
            if self.row.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![self.row.clone()])
        }
    }

    fn ana_row() -> Row {
        let mut row = Row::new();
        row.insert("name", "Ana");
        row
    }

    fn users_query() -> Query {
        Query::new("SELECT name FROM users WHERE id=?").bind(42)
    }

    const ANA_KEY: &str = "1e561aa8ba017f413047389772d990d1bb88be6ad6bbb6f29674459a85eedfef";

    #[tokio::test]
    async fn miss_executes_and_populates_store() {
        let store = MemoryStore::default();
        let entries = Arc::clone(&store.entries);
        let cache = QueryCache::new(store);
        let executor = FakeExecutor::returning(ana_row());

        let row = cache
            .fetch_row(&executor, &users_query(), TTL_5S)
            .await
            .expect("fetch row");

        assert_eq!(row, ana_row());
        assert_eq!(executor.calls(), 1);
        let stored = entries.lock().expect("entries lock");
        assert_eq!(
            stored.get(ANA_KEY).map(String::as_str),
            Some(r#"{"name":"Ana"}"#)
        );
    }

    #[tokio::test]
    async fn hit_bypasses_executor() {
        let store = MemoryStore::default();
        store.preload(ANA_KEY, r#"{"name":"Ana"}"#);
        let cache = QueryCache::new(store);
        let executor = FakeExecutor::failing();

        let row = cache
            .fetch_row(&executor, &users_query(), TTL_5S)
            .await
            .expect("fetch row");

        assert_eq!(row.get("name").and_then(CellValue::as_str), Some("Ana"));
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn corrupt_entry_degrades_to_fallback() {
        let store = MemoryStore::default();
        store.preload(ANA_KEY, "not json at all");
        let sink = Arc::new(RecordingSink::new());
        let entries = store.entries.clone();
        let cache = QueryCache::new(store).with_events(sink.clone());
        let executor = FakeExecutor::returning(ana_row());

        let row = cache
            .fetch_row(&executor, &users_query(), TTL_5S)
            .await
            .expect("fetch row");

        assert_eq!(row, ana_row());
        assert_eq!(executor.calls(), 1);
        assert!(matches!(
            sink.events()[0],
            CacheEvent::DecodeFailed { .. }
        ));
        // The corrupt payload was overwritten with the authoritative result.
        assert_eq!(
            entries.lock().expect("entries lock").get(ANA_KEY).map(String::as_str),
            Some(r#"{"name":"Ana"}"#)
        );
    }

    #[tokio::test]
    async fn shape_mismatch_is_a_decode_failure() {
        let store = MemoryStore::default();
        // Valid JSON, wrong shape for a single row.
        store.preload(ANA_KEY, r#"[{"name":"Ana"}]"#);
        let sink = Arc::new(RecordingSink::new());
        let cache = QueryCache::new(store).with_events(sink.clone());
        let executor = FakeExecutor::returning(ana_row());

        let row = cache
            .fetch_row(&executor, &users_query(), TTL_5S)
            .await
            .expect("fetch row");

        assert_eq!(row, ana_row());
        assert!(matches!(sink.events()[0], CacheEvent::DecodeFailed { .. }));
    }

    #[tokio::test]
    async fn disabled_cache_calls_executor_directly() {
        let cache = QueryCache::<MemoryStore>::disabled();
        let executor = FakeExecutor::returning(ana_row());

        let row = cache
            .fetch_row(&executor, &users_query(), TTL_5S)
            .await
            .expect("fetch row");
        assert_eq!(row, ana_row());

        let rows = cache
            .fetch_rows(&executor, &users_query(), TTL_5S)
            .await
            .expect("fetch rows");
        assert_eq!(rows, vec![ana_row()]);
        assert_eq!(executor.calls(), 2);
    }

    #[tokio::test]
    async fn acquire_failure_falls_back_without_caching() {
        let store = MemoryStore {
            fail_acquire: true,
            ..Default::default()
        };
        let entries = store.entries.clone();
        let sink = Arc::new(RecordingSink::new());
        let cache = QueryCache::new(store).with_events(sink.clone());
        let executor = FakeExecutor::returning(ana_row());

        let row = cache
            .fetch_row(&executor, &users_query(), TTL_5S)
            .await
            .expect("fetch row");

        assert_eq!(row, ana_row());
        assert_eq!(executor.calls(), 1);
        assert!(entries.lock().expect("entries lock").is_empty());
        assert!(matches!(
            sink.events()[0],
            CacheEvent::StoreUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn get_failure_falls_back_and_still_writes() {
        let store = MemoryStore {
            fail_get: true,
            ..Default::default()
        };
        let entries = store.entries.clone();
        let cache = QueryCache::new(store);
        let executor = FakeExecutor::returning(ana_row());

        let row = cache
            .fetch_row(&executor, &users_query(), TTL_5S)
            .await
            .expect("fetch row");

        assert_eq!(row, ana_row());
        assert!(entries.lock().expect("entries lock").contains_key(ANA_KEY));
    }

    #[tokio::test]
    async fn write_failure_does_not_affect_result() {
        let store = MemoryStore {
            fail_set: true,
            ..Default::default()
        };
        let sink = Arc::new(RecordingSink::new());
        let cache = QueryCache::new(store).with_events(sink.clone());
        let executor = FakeExecutor::returning(ana_row());

        let row = cache
            .fetch_row(&executor, &users_query(), TTL_5S)
            .await
            .expect("fetch row");

        assert_eq!(row, ana_row());
        let events = sink.events();
        assert!(events.contains(&CacheEvent::Miss {
            key: ANA_KEY.to_string()
        }));
        assert!(
            events
                .iter()
                .any(|event| matches!(event, CacheEvent::WriteFailed { .. }))
        );
    }

    #[tokio::test]
    async fn empty_row_is_never_cached() {
        let store = MemoryStore::default();
        let entries = store.entries.clone();
        let cache = QueryCache::new(store);
        let executor = FakeExecutor::empty();

        let row = cache
            .fetch_row(&executor, &users_query(), TTL_5S)
            .await
            .expect("fetch row");

        assert!(row.is_empty());
        assert!(entries.lock().expect("entries lock").is_empty());
    }

    #[tokio::test]
    async fn empty_result_set_is_never_cached() {
        let store = MemoryStore::default();
        let entries = store.entries.clone();
        let cache = QueryCache::new(store);
        let executor = FakeExecutor::empty();

        let rows = cache
            .fetch_rows(&executor, &users_query(), TTL_5S)
            .await
            .expect("fetch rows");

        assert!(rows.is_empty());
        assert!(entries.lock().expect("entries lock").is_empty());
    }

    #[tokio::test]
    async fn executor_error_propagates_without_caching() {
        let store = MemoryStore::default();
        let entries = store.entries.clone();
        let cache = QueryCache::new(store);
        let executor = FakeExecutor::failing();

        let result = cache.fetch_row(&executor, &users_query(), TTL_5S).await;

        assert!(matches!(result, Err(ExecutorError::Query(_))));
        assert!(entries.lock().expect("entries lock").is_empty());
    }

    #[tokio::test]
    async fn second_call_within_ttl_is_served_from_store() {
        let store = MemoryStore::default();
        let sink = Arc::new(RecordingSink::new());
        let cache = QueryCache::new(store).with_events(sink.clone());
        let executor = FakeExecutor::returning(ana_row());

        let first = cache
            .fetch_row(&executor, &users_query(), TTL_5S)
            .await
            .expect("first fetch");
        let second = cache
            .fetch_row(&executor, &users_query(), TTL_5S)
            .await
            .expect("second fetch");

        assert_eq!(first, second);
        assert_eq!(executor.calls(), 1);
        let events = sink.events();
        assert!(matches!(events[0], CacheEvent::Miss { .. }));
        assert!(matches!(events[1], CacheEvent::Hit { .. }));
    }

    #[tokio::test]
    async fn multi_row_round_trip_through_store() {
        let store = MemoryStore::default();
        let entries = store.entries.clone();
        let cache = QueryCache::new(store);
        let executor = FakeExecutor::returning(ana_row());

        let rows = cache
            .fetch_rows(&executor, &users_query(), TTL_5S)
            .await
            .expect("fetch rows");
        assert_eq!(rows, vec![ana_row()]);
        assert_eq!(
            entries
                .lock()
                .expect("entries lock")
                .get(ANA_KEY)
                .map(String::as_str),
            Some(r#"[{"name":"Ana"}]"#)
        );

        let cached = cache
            .fetch_rows(&executor, &users_query(), TTL_5S)
            .await
            .expect("cached fetch");
        assert_eq!(cached, rows);
        assert_eq!(executor.calls(), 1);
    }
}
