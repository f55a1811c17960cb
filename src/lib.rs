//! satchel: service-glue toolkit.
//!
//! Thin, composable wrappers around the backends a typical service talks
//! to: a Redis key-value store, a Postgres executor, webhook status
//! alerts, a JSON queue publisher, and a tiny i18n map. The one piece
//! with a real correctness contract is the read-through
//! [`QueryCache`](cache::QueryCache): it derives a deterministic key from
//! a query and its arguments, serves decoded results from the store, and
//! on any miss or cache-layer failure falls back to the authoritative
//! executor — cache problems can make things slower, never less
//! available.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use satchel::cache::QueryCache;
//! use satchel::db::{PgExecutor, Query};
//! use satchel::store::{RedisStore, TTL_5M};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = PgExecutor::connect("postgres://app@localhost/main", 8).await?;
//! let store = RedisStore::open("redis://localhost/0", "my-service")?;
//! let cache = QueryCache::new(store);
//!
//! let query = Query::new("SELECT name FROM users WHERE id = $1").bind(42);
//! let row = cache.fetch_row(&executor, &query, TTL_5M).await?;
//! println!("{:?}", row.get("name"));
//! # Ok(())
//! # }
//! ```

pub mod alert;
pub mod cache;
pub mod config;
pub mod db;
pub mod lang;
pub mod queue;
pub mod row;
pub mod store;
pub mod telemetry;
pub mod util;

pub use cache::QueryCache;
pub use db::{Query, QueryArg};
pub use row::{CellValue, Row};
