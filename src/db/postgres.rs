//! Postgres executor over a sqlx pool.
//!
//! Rows are decoded dynamically into the closed [`CellValue`] set by
//! Postgres type name. Text-family arrays come back as `StringArray`;
//! timestamps are rendered as text so results stay JSON-serializable.
//! Unrecognized types get one last chance as text before the column is
//! reported as undecodable.

use sqlx::Row as SqlxRow;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, TypeInfo, ValueRef};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use async_trait::async_trait;

use crate::row::{CellValue, Row};

use super::{ExecutorError, Query, QueryArg, RelationalExecutor};

#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, ExecutorError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(ExecutorError::connection)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), ExecutorError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    /// Run a statement that returns no rows; yields the affected-row count.
    pub async fn execute(&self, query: &Query) -> Result<u64, ExecutorError> {
        let result = bind_args(sqlx::query(query.text()), query.args())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RelationalExecutor for PgExecutor {
    async fn fetch_row(&self, query: &Query) -> Result<Row, ExecutorError> {
        let row = bind_args(sqlx::query(query.text()), query.args())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        match row {
            Some(row) => decode_row(&row),
            None => Ok(Row::new()),
        }
    }

    async fn fetch_rows(&self, query: &Query) -> Result<Vec<Row>, ExecutorError> {
        let rows = bind_args(sqlx::query(query.text()), query.args())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(decode_row).collect()
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_args<'q>(mut query: PgQuery<'q>, args: &'q [QueryArg]) -> PgQuery<'q> {
    for arg in args {
        query = match arg {
            QueryArg::Str(value) => query.bind(value),
            QueryArg::Int(value) => query.bind(value),
            QueryArg::Float(value) => query.bind(value),
            QueryArg::Bool(value) => query.bind(value),
            QueryArg::Null => query.bind(Option::<String>::None),
        };
    }
    query
}

fn decode_row(row: &PgRow) -> Result<Row, ExecutorError> {
    let mut decoded = Row::new();

    for column in row.columns() {
        let name = column.name();
        let ordinal = column.ordinal();

        let raw = row
            .try_get_raw(ordinal)
            .map_err(|err| ExecutorError::decode(name, err))?;
        if raw.is_null() {
            decoded.insert(name, CellValue::Null);
            continue;
        }
        let type_name = raw.type_info().name().to_string();

        let value = decode_column(row, ordinal, name, &type_name)?;
        decoded.insert(name, value);
    }

    Ok(decoded)
}

fn decode_column(
    row: &PgRow,
    ordinal: usize,
    name: &str,
    type_name: &str,
) -> Result<CellValue, ExecutorError> {
    let decode_err = |err: sqlx::Error| ExecutorError::decode(name, err);

    let value = match type_name {
        "BOOL" => CellValue::Bool(row.try_get::<bool, _>(ordinal).map_err(decode_err)?),
        "INT2" => CellValue::Number(f64::from(
            row.try_get::<i16, _>(ordinal).map_err(decode_err)?,
        )),
        "INT4" => CellValue::Number(f64::from(
            row.try_get::<i32, _>(ordinal).map_err(decode_err)?,
        )),
        "INT8" => int8_to_cell(row.try_get::<i64, _>(ordinal).map_err(decode_err)?),
        "FLOAT4" => CellValue::Number(f64::from(
            row.try_get::<f32, _>(ordinal).map_err(decode_err)?,
        )),
        "FLOAT8" => CellValue::Number(row.try_get::<f64, _>(ordinal).map_err(decode_err)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => {
            CellValue::String(row.try_get::<String, _>(ordinal).map_err(decode_err)?)
        }
        "TEXT[]" | "VARCHAR[]" => {
            CellValue::StringArray(row.try_get::<Vec<String>, _>(ordinal).map_err(decode_err)?)
        }
        "TIMESTAMPTZ" => {
            let value: time::OffsetDateTime = row.try_get(ordinal).map_err(decode_err)?;
            let text = value
                .format(&Rfc3339)
                .map_err(|err| ExecutorError::decode(name, err))?;
            CellValue::String(text)
        }
        "TIMESTAMP" => {
            let value: time::PrimitiveDateTime = row.try_get(ordinal).map_err(decode_err)?;
            let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
            let text = value
                .format(&format)
                .map_err(|err| ExecutorError::decode(name, err))?;
            CellValue::String(text)
        }
        "DATE" => {
            let value: time::Date = row.try_get(ordinal).map_err(decode_err)?;
            let format = format_description!("[year]-[month]-[day]");
            let text = value
                .format(&format)
                .map_err(|err| ExecutorError::decode(name, err))?;
            CellValue::String(text)
        }
        "JSON" | "JSONB" => {
            let value: serde_json::Value = row.try_get(ordinal).map_err(decode_err)?;
            CellValue::String(value.to_string())
        }
        // Last resort: many remaining types have a text representation.
        _ => CellValue::String(row.try_get::<String, _>(ordinal).map_err(decode_err)?),
    };

    Ok(value)
}

// f64 represents integers exactly only up to 2^53; bigints beyond that
// come back as text instead of a silently rounded number.
fn int8_to_cell(value: i64) -> CellValue {
    const MAX_SAFE: i64 = 1 << 53;
    if (-MAX_SAFE..=MAX_SAFE).contains(&value) {
        CellValue::Number(value as f64)
    } else {
        CellValue::String(value.to_string())
    }
}

fn map_sqlx_error(err: sqlx::Error) -> ExecutorError {
    match err {
        err @ (sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Configuration(_)) => ExecutorError::connection(err),
        err => ExecutorError::query(err),
    }
}
