//! Cache event channel.
//!
//! The read-through contract swallows every cache-layer failure, so those
//! failures are surfaced here instead of vanishing into ad hoc log lines:
//! each hit, miss, and absorbed error is published as a structured
//! [`CacheEvent`] to an [`EventSink`] the host application chooses.
//! Publishing never fails and never changes control flow.

use std::sync::Mutex;

use metrics::counter;
use tracing::{debug, warn};

/// What happened inside one read-through call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A stored entry decoded cleanly; the executor was bypassed.
    Hit { key: String },
    /// No entry under the key; the executor was consulted.
    Miss { key: String },
    /// The store could not be reached or a command failed; the call
    /// continued against the executor.
    StoreUnavailable { message: String },
    /// A stored entry was present but not decodable; treated as a miss.
    DecodeFailed { key: String, message: String },
    /// A fresh result could not be serialized; nothing was written.
    EncodeFailed { key: String, message: String },
    /// The fallback write failed; the fresh result was still returned.
    WriteFailed { key: String, message: String },
}

/// Observer for cache events. Implementations must not panic or block.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: CacheEvent);
}

/// Default sink: structured logs plus metrics counters.
pub struct TelemetrySink;

impl EventSink for TelemetrySink {
    fn publish(&self, event: CacheEvent) {
        match &event {
            CacheEvent::Hit { key } => {
                counter!("satchel_query_cache_hit_total").increment(1);
                debug!(key, "query cache hit");
            }
            CacheEvent::Miss { key } => {
                counter!("satchel_query_cache_miss_total").increment(1);
                debug!(key, "query cache miss");
            }
            CacheEvent::StoreUnavailable { message } => {
                counter!("satchel_query_cache_store_error_total").increment(1);
                warn!(error = %message, "cache store unavailable, falling back to executor");
            }
            CacheEvent::DecodeFailed { key, message } => {
                counter!("satchel_query_cache_decode_error_total").increment(1);
                warn!(key, error = %message, "corrupt cache entry, falling back to executor");
            }
            CacheEvent::EncodeFailed { key, message } => {
                counter!("satchel_query_cache_encode_error_total").increment(1);
                warn!(key, error = %message, "failed to serialize result for caching");
            }
            CacheEvent::WriteFailed { key, message } => {
                counter!("satchel_query_cache_write_error_total").increment(1);
                warn!(key, error = %message, "failed to write cache entry");
            }
        }
    }
}

/// In-memory sink that records every event, in order. Intended for tests
/// and diagnostics.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CacheEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CacheEvent> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CacheEvent>> {
        // A poisoned lock must not wedge the sink.
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: CacheEvent) {
        self.lock().push(event);
    }
}
