//! Redis-backed key-value store.
//!
//! Keys are namespaced with a service prefix (`<service>:<key>`) so several
//! services can share one Redis instance without stepping on each other.
//! The prefix defaults to the current executable's basename. `scan` strips
//! the prefix from returned keys, so patterns and deletions compose.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

use crate::config::StoreSettings;

use super::{KeyValueStore, StoreConnection, StoreError};

const SCAN_BATCH: usize = 100;

pub struct RedisStore {
    client: redis::Client,
    namespace: String,
}

impl RedisStore {
    /// Build a store from settings. The underlying client connects lazily;
    /// use [`RedisStore::ping`] to verify reachability up front.
    pub fn connect(settings: &StoreSettings) -> Result<Self, StoreError> {
        let namespace = settings
            .namespace
            .clone()
            .unwrap_or_else(service_namespace);
        Self::open(&settings.url(), namespace)
    }

    pub fn open(url: &str, namespace: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(StoreError::unavailable)?;
        Ok(Self {
            client,
            namespace: namespace.into(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Round-trip a PING to confirm the server is reachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.acquire().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn.conn)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    type Conn = RedisConnection;

    async fn acquire(&self) -> Result<Self::Conn, StoreError> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::unavailable)?;
        Ok(RedisConnection {
            conn,
            namespace: self.namespace.clone(),
        })
    }
}

pub struct RedisConnection {
    conn: MultiplexedConnection,
    namespace: String,
}

impl RedisConnection {
    fn scoped(&self, key: &str) -> String {
        scoped_key(&self.namespace, key)
    }
}

#[async_trait]
impl StoreConnection for RedisConnection {
    async fn get(&mut self, key: &str) -> Result<String, StoreError> {
        let key = self.scoped(key);
        let value: Option<String> = self
            .conn
            .get(key)
            .await
            .map_err(StoreError::unavailable)?;
        value.ok_or(StoreError::NotFound)
    }

    async fn set(&mut self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let key = self.scoped(key);
        let _: () = self
            .conn
            .set_ex(key, value, ttl_seconds(ttl))
            .await
            .map_err(StoreError::unavailable)?;
        Ok(())
    }

    async fn del(&mut self, key: &str) -> Result<(), StoreError> {
        let key = self.scoped(key);
        let _: () = self
            .conn
            .del(key)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(())
    }

    async fn del_many(&mut self, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let scoped: Vec<String> = keys.iter().map(|key| self.scoped(key)).collect();
        let _: () = self
            .conn
            .del(scoped)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(())
    }

    async fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
        let key = self.scoped(key);
        self.conn
            .exists(key)
            .await
            .map_err(StoreError::unavailable)
    }

    async fn scan(&mut self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let scoped_pattern = self.scoped(pattern);
        let prefix = format!("{}:", self.namespace);
        let mut cursor: u64 = 0;
        let mut result = Vec::new();

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&scoped_pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut self.conn)
                .await
                .map_err(StoreError::unavailable)?;

            result.extend(
                keys.into_iter()
                    .map(|key| key.strip_prefix(&prefix).map(str::to_string).unwrap_or(key)),
            );

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(result)
    }
}

fn scoped_key(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}

/// Redis EX takes whole seconds; sub-second TTLs round up so an entry never
/// expires before the caller asked for.
fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if secs == 0 || ttl.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

fn service_namespace() -> String {
    std::env::args()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}
