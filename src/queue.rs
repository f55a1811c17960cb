//! Queue publishing.
//!
//! A publisher serializes a payload to JSON and appends it to a named
//! queue; consumers are somebody else's problem. The provided backend
//! pushes onto a Redis list, which keeps the glue on the same store
//! technology as the cache layer.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::Serialize;
use thiserror::Error;

use crate::config::QueueSettings;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("queue connection error: {message}")]
    Connection { message: String },
    #[error("failed to publish message: {message}")]
    Publish { message: String },
}

impl QueueError {
    fn connection(message: impl std::fmt::Display) -> Self {
        Self::Connection {
            message: message.to_string(),
        }
    }

    fn publish(message: impl std::fmt::Display) -> Self {
        Self::Publish {
            message: message.to_string(),
        }
    }
}

/// Fire-and-forget JSON message publishing.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    async fn publish_json(&self, payload: &serde_json::Value) -> Result<(), QueueError>;
}

/// Serialize any value and publish it through the given publisher.
pub async fn publish<T: Serialize>(
    publisher: &impl QueuePublisher,
    payload: &T,
) -> Result<(), QueueError> {
    let value = serde_json::to_value(payload)?;
    publisher.publish_json(&value).await
}

/// Redis-list-backed queue: `publish_json` LPUSHes onto the configured
/// list, so a consumer draining with BRPOP sees FIFO order.
pub struct RedisQueue {
    client: redis::Client,
    queue: String,
}

impl RedisQueue {
    pub fn connect(settings: &QueueSettings) -> Result<Self, QueueError> {
        Self::open(&settings.url(), settings.queue.clone())
    }

    pub fn open(url: &str, queue: impl Into<String>) -> Result<Self, QueueError> {
        let client = redis::Client::open(url).map_err(QueueError::connection)?;
        Ok(Self {
            client,
            queue: queue.into(),
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    /// Verify the broker is reachable without publishing anything.
    pub async fn check_connection(&self) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::connection)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::connection)?;
        Ok(())
    }
}

#[async_trait]
impl QueuePublisher for RedisQueue {
    async fn publish_json(&self, payload: &serde_json::Value) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::connection)?;
        let _: () = conn
            .lpush(&self.queue, payload.to_string())
            .await
            .map_err(QueueError::publish)?;
        Ok(())
    }
}
