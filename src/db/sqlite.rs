//! SQLite database client implementation.
//!
//! Implements the `DatabaseClient` trait over sqlx. Every pooled connection
//! is put into enforced read-only mode (`PRAGMA query_only = ON`) before it
//! serves a statement, so the engine itself refuses writes independently of
//! the validator.

use crate::config::Config;
use crate::db::{ColumnDescriptor, ColumnInfo, DatabaseClient, QueryResult, Row, Value};
use crate::error::{AskdbError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::debug;

/// Maximum pooled connections; reads never contend for a writer lock.
const MAX_CONNECTIONS: u32 = 5;

/// Timeout for acquiring a pooled connection.
const ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl SqliteClient {
    /// Opens a read-only pool for the configured database.
    ///
    /// Fails with a catalog error when the database file cannot be opened
    /// (missing, corrupt, or not a database).
    pub async fn connect(config: &Config) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| {
                AskdbError::config(format!(
                    "Invalid database URL '{}': {e}",
                    config.database_url
                ))
            })?
            // Session-level write refusal, beneath the validator.
            .pragma("query_only", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect_with(options)
            .await
            .map_err(|e| {
                AskdbError::catalog(format!(
                    "Cannot open database '{}': {e}",
                    config.database_url
                ))
            })?;

        debug!(database_url = %config.database_url, "Opened read-only SQLite pool");

        Ok(Self {
            pool,
            query_timeout: Duration::from_secs(config.query_timeout_secs),
        })
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    async fn list_tables(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AskdbError::catalog(format!("Failed to read system catalog: {e}")))
    }

    async fn describe_table(&self, name: &str) -> Result<Vec<ColumnDescriptor>> {
        // Exact-match membership check against the live catalog. The name is
        // never interpolated into SQL before this check passes.
        let tables = self.list_tables().await?;
        if !tables.iter().any(|t| t == name) {
            return Err(AskdbError::UnknownTable(name.to_string()));
        }

        let rows: Vec<(String, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT name, type, "notnull", pk
            FROM pragma_table_info(?1)
            ORDER BY cid
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AskdbError::catalog(format!("Failed to describe table '{name}': {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(col_name, data_type, not_null, pk)| ColumnDescriptor {
                name: col_name,
                data_type,
                not_null: not_null != 0,
                primary_key: pk != 0,
            })
            .collect())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(self.query_timeout, sqlx::query(sql).fetch_all(&self.pool))
            .await
            .map_err(|_| {
                AskdbError::timeout(format!(
                    "Query exceeded {} seconds",
                    self.query_timeout.as_secs()
                ))
            })?
            .map_err(|e| AskdbError::execution(format_engine_error(&e)))?;

        let execution_time = start.elapsed();

        // sqlx surfaces column metadata through rows; an empty result set
        // carries no columns, which downstream shaping tolerates.
        let columns: Vec<ColumnInfo> = result
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<Row> = result.iter().map(convert_row).collect();
        let row_count = rows.len();

        debug!(
            execution_time_ms = execution_time.as_millis() as u64,
            row_count, "Executed statement"
        );

        Ok(QueryResult {
            columns,
            rows,
            execution_time,
            row_count,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a SqliteRow to our Value type.
fn convert_value(row: &SqliteRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "REAL" | "FLOAT" | "DOUBLE" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Blob)
            .unwrap_or(Value::Null),

        "NULL" => Value::Null,

        "TEXT" | "DATETIME" | "DATE" => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::Text)
            .unwrap_or(Value::Null),

        // Unrecognized declared types: cascade through the storage classes.
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::Text)
            .or_else(|| {
                row.try_get::<Option<i64>, _>(index)
                    .ok()
                    .flatten()
                    .map(Value::Int)
            })
            .or_else(|| {
                row.try_get::<Option<f64>, _>(index)
                    .ok()
                    .flatten()
                    .map(Value::Float)
            })
            .unwrap_or(Value::Null),
    }
}

/// Formats a sqlx execution error, preferring the engine's own message.
fn format_engine_error(error: &sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}
