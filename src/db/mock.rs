//! Mock database client for testing.
//!
//! Scripted tables and results, plus call counters so tests can assert that
//! a rejected candidate never reached the executor or that a fast-failing
//! request never touched the catalog.

use super::{ColumnDescriptor, ColumnInfo, DatabaseClient, QueryResult, TableInfo, Value};
use crate::error::{AskdbError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A mock database client that returns predefined results.
#[derive(Default)]
pub struct MockDatabaseClient {
    tables: Vec<TableInfo>,
    /// (substring pattern, canned result) pairs checked in order.
    canned_results: Vec<(String, QueryResult)>,
    broken_catalog: bool,
    list_calls: AtomicUsize,
    describe_calls: AtomicUsize,
    execute_calls: AtomicUsize,
}

impl MockDatabaseClient {
    /// Creates a mock with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock exposing the sales fixture tables.
    pub fn with_sales_tables() -> Self {
        let id = || ColumnDescriptor::new("id", "INTEGER").primary_key().not_null();
        Self {
            tables: vec![
                TableInfo::new(
                    "customers",
                    vec![
                        id(),
                        ColumnDescriptor::new("name", "TEXT").not_null(),
                        ColumnDescriptor::new("region", "TEXT").not_null(),
                        ColumnDescriptor::new("segment", "TEXT").not_null(),
                    ],
                ),
                TableInfo::new(
                    "order_items",
                    vec![
                        ColumnDescriptor::new("order_id", "INTEGER").not_null(),
                        ColumnDescriptor::new("product_id", "INTEGER").not_null(),
                        ColumnDescriptor::new("quantity", "INTEGER").not_null(),
                    ],
                ),
                TableInfo::new(
                    "orders",
                    vec![
                        id(),
                        ColumnDescriptor::new("customer_id", "INTEGER").not_null(),
                        ColumnDescriptor::new("amount", "REAL").not_null(),
                        ColumnDescriptor::new("order_date", "TEXT").not_null(),
                    ],
                ),
                TableInfo::new(
                    "products",
                    vec![
                        id(),
                        ColumnDescriptor::new("name", "TEXT").not_null(),
                        ColumnDescriptor::new("category", "TEXT").not_null(),
                        ColumnDescriptor::new("price", "REAL").not_null(),
                    ],
                ),
            ],
            ..Self::default()
        }
    }

    /// Creates a mock whose catalog reads always fail.
    pub fn with_broken_catalog() -> Self {
        Self {
            broken_catalog: true,
            ..Self::default()
        }
    }

    /// Adds a canned result returned when the executed SQL contains `pattern`.
    pub fn with_result(mut self, pattern: impl Into<String>, result: QueryResult) -> Self {
        self.canned_results.push((pattern.into(), result));
        self
    }

    /// Number of `list_tables` calls so far.
    pub fn list_table_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `describe_table` calls so far.
    pub fn describe_table_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    /// Number of `execute_query` calls so far.
    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn list_tables(&self) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_catalog {
            return Err(AskdbError::catalog("mock catalog unavailable"));
        }
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn describe_table(&self, name: &str) -> Result<Vec<ColumnDescriptor>> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_catalog {
            return Err(AskdbError::catalog("mock catalog unavailable"));
        }
        self.tables
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.columns.clone())
            .ok_or_else(|| AskdbError::UnknownTable(name.to_string()))
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);

        for (pattern, result) in &self.canned_results {
            if sql.contains(pattern.as_str()) {
                return Ok(result.clone());
            }
        }

        // Default: one text row echoing the statement.
        Ok(QueryResult {
            columns: vec![ColumnInfo::new("result", "TEXT")],
            rows: vec![vec![Value::Text(format!("mock result for: {sql}"))]],
            execution_time: Duration::from_millis(1),
            row_count: 1,
        })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
