//! Database access layer for askdb.
//!
//! Provides a trait-based interface over a read-only connection: catalog
//! introspection plus statement execution. The live implementation targets
//! SQLite; a mock implementation backs the tests.

mod mock;
mod schema;
mod sqlite;
mod types;

pub use mock::MockDatabaseClient;
pub use schema::{ColumnDescriptor, SchemaContext, TableInfo};
pub use sqlite::SqliteClient;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;

/// Opens a read-only database client for the configured database.
pub async fn connect(config: &Config) -> Result<Box<dyn DatabaseClient>> {
    let client = SqliteClient::connect(config).await?;
    Ok(Box::new(client))
}

/// Trait defining the read-only interface the gateway needs from a database.
///
/// Implementations never expose a write path; the data model has no
/// representation for mutating statements.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Lists user table names from the system catalog, in catalog order.
    ///
    /// Reads only catalog metadata, never user table contents. Fails with
    /// [`crate::error::AskdbError::Catalog`] when the catalog cannot be read.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Describes the columns of a named table.
    ///
    /// The name is first checked against the live catalog with a
    /// case-sensitive exact match; anything else fails with
    /// [`crate::error::AskdbError::UnknownTable`] before any other statement
    /// runs.
    async fn describe_table(&self, name: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Executes a statement and returns the result set.
    ///
    /// The underlying session is in enforced read-only mode; any write is
    /// refused by the engine regardless of what the caller validated.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}

/// Builds the full schema snapshot: list the catalog, then describe each
/// table. This is the orchestrator's schema-gathering step.
pub async fn schema_context(db: &dyn DatabaseClient) -> Result<SchemaContext> {
    let names = db.list_tables().await?;
    let mut tables = Vec::with_capacity(names.len());

    for name in names {
        let columns = db.describe_table(&name).await?;
        tables.push(TableInfo::new(name, columns));
    }

    Ok(SchemaContext { tables })
}
