//! Key-value store collaborators.
//!
//! The cache layer talks to the store through a provider/connection trait
//! pair: a [`KeyValueStore`] hands out short-lived [`StoreConnection`]s, one
//! per operation, released on drop. "Key not found" is a distinguished
//! condition, not a failure; everything else collapses into
//! [`StoreError::Unavailable`].

mod redis;
mod ttl;

pub use redis::{RedisConnection, RedisStore};
pub use ttl::*;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The key has no entry. An expected condition, never logged as an error.
    #[error("key not found")]
    NotFound,
    /// Any other store failure: connect, transport, or command errors.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// Provider of scoped store connections.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    type Conn: StoreConnection;

    /// Acquire a connection scoped to one operation. The connection is
    /// released when dropped; callers never hold one across calls.
    async fn acquire(&self) -> Result<Self::Conn, StoreError>;
}

/// One scoped store connection.
#[async_trait]
pub trait StoreConnection: Send {
    async fn get(&mut self, key: &str) -> Result<String, StoreError>;

    async fn set(&mut self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn del(&mut self, key: &str) -> Result<(), StoreError>;

    async fn del_many(&mut self, keys: &[String]) -> Result<(), StoreError>;

    async fn exists(&mut self, key: &str) -> Result<bool, StoreError>;

    /// Collect every key matching a glob-style pattern, e.g. `user:*`.
    async fn scan(&mut self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Scan for keys matching the pattern and delete them.
    async fn del_by_pattern(&mut self, pattern: &str) -> Result<(), StoreError> {
        let keys = self.scan(pattern).await?;
        if keys.is_empty() {
            return Ok(());
        }
        self.del_many(&keys).await
    }
}
