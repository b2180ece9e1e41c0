//! Schema context types for askdb.
//!
//! A read-only snapshot of table/column metadata used to ground query
//! generation. Consumers never mutate it; the orchestrator builds a fresh
//! snapshot per request.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// The complete schema snapshot for a database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaContext {
    /// All user tables, in catalog order.
    pub tables: Vec<TableInfo>,
}

impl SchemaContext {
    /// Creates a new empty schema context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of all tables in the snapshot.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    /// Returns true if the snapshot contains no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Formats the schema for inclusion in a generation prompt.
    pub fn format_for_llm(&self) -> String {
        let tables_text = self
            .tables
            .iter()
            .map(format_table_for_llm)
            .collect::<Vec<_>>()
            .join("\n");

        format!("Database Schema:\n\n{}", tables_text)
    }

    /// Computes a hash of the schema content, used to invalidate the cached
    /// generation prompt when the database changes between requests.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tables.len().hash(&mut hasher);
        for table in &self.tables {
            table.name.hash(&mut hasher);
            table.columns.len().hash(&mut hasher);
            for col in &table.columns {
                col.name.hash(&mut hasher);
                col.data_type.hash(&mut hasher);
                col.not_null.hash(&mut hasher);
                col.primary_key.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

fn format_table_for_llm(table: &TableInfo) -> String {
    let column_lines = table
        .columns
        .iter()
        .map(|column| {
            let annotations = [
                column.primary_key.then_some("PK"),
                column.not_null.then_some("NOT NULL"),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();

            if annotations.is_empty() {
                format!("  - {}: {}\n", column.name, column.data_type)
            } else {
                format!(
                    "  - {}: {} ({})\n",
                    column.name,
                    column.data_type,
                    annotations.join(", ")
                )
            }
        })
        .collect::<Vec<_>>()
        .join("");

    format!("Table: {}\n{}", table.name, column_lines)
}

/// A single table in the schema snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name.
    pub name: String,

    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
}

impl TableInfo {
    /// Creates a new table with the given name and columns.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }
}

/// A single column description: name, declared type and constraint flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,

    /// Declared type (e.g., "INTEGER", "TEXT", "REAL").
    pub data_type: String,

    /// Whether the column carries a NOT NULL constraint.
    pub not_null: bool,

    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

impl ColumnDescriptor {
    /// Creates a new nullable, non-key column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            not_null: false,
            primary_key: false,
        }
    }

    /// Marks the column NOT NULL.
    pub fn not_null(self) -> Self {
        Self {
            not_null: true,
            ..self
        }
    }

    /// Marks the column as part of the primary key.
    pub fn primary_key(self) -> Self {
        Self {
            primary_key: true,
            ..self
        }
    }
}
