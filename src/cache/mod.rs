//! Read-through query result caching.
//!
//! Wraps a query+arguments pair into a deterministic key, tries the
//! key-value store, and on any miss, decode failure, or store error
//! transparently executes the query and repopulates the store. See
//! [`QueryCache`] for the contract.

mod events;
mod key;
mod read_through;

pub use events::{CacheEvent, EventSink, RecordingSink, TelemetrySink};
pub use key::derive_key;
pub use read_through::QueryCache;
