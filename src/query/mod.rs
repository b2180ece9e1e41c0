//! Query execution.
//!
//! A thin, traced wrapper around the database client that only accepts
//! validated statements. `run` takes [`AcceptedStatement`], which nothing but
//! the validator can construct; handing it a rejected candidate is therefore
//! impossible rather than a runtime condition to handle.

use std::time::{Duration, Instant};

use crate::db::{DatabaseClient, QueryResult};
use crate::error::Result;
use crate::safety::AcceptedStatement;
use tracing::{debug, info};

/// Executes accepted statements against the read-only database session.
pub struct QueryExecutor<'a> {
    db: &'a dyn DatabaseClient,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new query executor.
    pub fn new(db: &'a dyn DatabaseClient) -> Self {
        Self { db }
    }

    /// Runs a validated statement and returns the result set.
    ///
    /// Engine failures (syntax, missing column, timeout) surface as
    /// execution/timeout errors; they are never retried, since a broken
    /// statement will not improve by re-running verbatim.
    pub async fn run(&self, statement: &AcceptedStatement) -> Result<QueryOutcome> {
        let start = Instant::now();
        debug!(sql = %statement, "Executing accepted statement");

        let result = self.db.execute_query(statement.as_str()).await;
        let execution_time = start.elapsed();

        match result {
            Ok(result) => {
                info!(
                    execution_time_ms = execution_time.as_millis() as u64,
                    row_count = result.row_count,
                    "Statement executed"
                );
                Ok(QueryOutcome {
                    result,
                    execution_time,
                })
            }
            Err(e) => {
                info!(
                    execution_time_ms = execution_time.as_millis() as u64,
                    error = %e,
                    "Statement failed"
                );
                Err(e)
            }
        }
    }
}

/// Successful execution outcome.
#[derive(Debug)]
pub struct QueryOutcome {
    /// The query result.
    pub result: QueryResult,
    /// Wall time observed by the executor, including pool acquisition.
    pub execution_time: Duration,
}
