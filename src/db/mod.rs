//! Relational executor collaborators.
//!
//! The cache layer treats the database as an authoritative source behind the
//! [`RelationalExecutor`] trait: run a parameterized query, get back ordered
//! [`Row`]s. "No rows matched" is an empty result with no error; only real
//! failures surface as [`ExecutorError`].

mod postgres;

pub use postgres::PgExecutor;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::row::Row;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("failed to decode column `{column}`: {message}")]
    Decode { column: String, message: String },
}

impl ExecutorError {
    pub fn connection(message: impl fmt::Display) -> Self {
        Self::Connection(message.to_string())
    }

    pub fn query(message: impl fmt::Display) -> Self {
        Self::Query(message.to_string())
    }

    pub fn decode(column: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.to_string(),
        }
    }
}

/// A scalar query argument.
///
/// The `Display` form doubles as the argument's contribution to the cache
/// key preimage, so it must stay stable across releases: strings render
/// verbatim, numbers and booleans in their canonical form, and null as
/// `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArg {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for QueryArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryArg::Str(value) => f.write_str(value),
            QueryArg::Int(value) => write!(f, "{value}"),
            QueryArg::Float(value) => write!(f, "{value}"),
            QueryArg::Bool(value) => write!(f, "{value}"),
            QueryArg::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for QueryArg {
    fn from(value: &str) -> Self {
        QueryArg::Str(value.to_string())
    }
}

impl From<String> for QueryArg {
    fn from(value: String) -> Self {
        QueryArg::Str(value)
    }
}

impl From<i32> for QueryArg {
    fn from(value: i32) -> Self {
        QueryArg::Int(i64::from(value))
    }
}

impl From<i64> for QueryArg {
    fn from(value: i64) -> Self {
        QueryArg::Int(value)
    }
}

impl From<f64> for QueryArg {
    fn from(value: f64) -> Self {
        QueryArg::Float(value)
    }
}

impl From<bool> for QueryArg {
    fn from(value: bool) -> Self {
        QueryArg::Bool(value)
    }
}

/// Query text plus its ordered arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    text: String,
    args: Vec<QueryArg>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument. Argument order is significant, both for the
    /// executor's positional binding and for cache key identity.
    pub fn bind(mut self, arg: impl Into<QueryArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn bind_null(self) -> Self {
        self.bind(QueryArg::Null)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn args(&self) -> &[QueryArg] {
        &self.args
    }
}

/// Authoritative query execution.
#[async_trait]
pub trait RelationalExecutor: Send + Sync {
    /// Run the query and decode the first row, or an empty row when nothing
    /// matched.
    async fn fetch_row(&self, query: &Query) -> Result<Row, ExecutorError>;

    /// Run the query and decode every row, in result-set order.
    async fn fetch_rows(&self, query: &Query) -> Result<Vec<Row>, ExecutorError>;
}
