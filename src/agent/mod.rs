//! The per-request orchestration pipeline.
//!
//! One `answer` call drives the whole request: resolve the provider, gather
//! the schema snapshot, obtain a candidate query, validate it, execute it
//! read-only, and shape the response. Single pass, no state revisited; the
//! only repetition anywhere is one bounded retry of a transiently-failed
//! provider call.

mod chart;

pub use chart::{build_chart_data, ChartData};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::{self, DatabaseClient};
use crate::error::{AskdbError, Result};
use crate::llm::{
    build_messages, extract_candidate_sql, Message, PromptCache, ProviderSelector,
    SelectedProvider,
};
use crate::query::QueryExecutor;
use crate::safety::{QueryValidator, Verdict};

/// The outcome of one answered question: the executed SQL, the rows as
/// ordered column-name → value maps, and the chart projection.
#[derive(Debug, Serialize)]
pub struct Answer {
    /// The validated, executed statement.
    pub sql: String,
    /// Result rows in engine column order.
    pub results: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Chart-ready projection of the rows.
    pub chart_data: ChartData,
}

/// Drives the question → schema → SQL → rows pipeline.
///
/// Safe to share across concurrent requests: the database pool, the resolved
/// provider handle and the prompt cache are the only shared state, and all
/// three tolerate concurrent use.
pub struct AgentOrchestrator {
    db: Arc<dyn DatabaseClient>,
    selector: ProviderSelector,
    prompt_cache: Mutex<PromptCache>,
    provider_timeout: Duration,
}

impl AgentOrchestrator {
    /// Creates an orchestrator over the given database and provider selector.
    pub fn new(db: Arc<dyn DatabaseClient>, selector: ProviderSelector, config: &Config) -> Self {
        Self {
            db,
            selector,
            prompt_cache: Mutex::new(PromptCache::new()),
            provider_timeout: Duration::from_secs(config.provider_timeout_secs),
        }
    }

    /// Answers a natural-language question with SQL results.
    ///
    /// Fails fast with `NoProvider` before touching the database when no
    /// generation backend is usable. Validation rejections and engine errors
    /// are expected outcomes, surfaced with their reason; they are never
    /// retried.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let start = Instant::now();
        debug!(question_len = question.len(), "Starting request pipeline");

        let selected = self.selector.current().await?;

        let schema = db::schema_context(self.db.as_ref()).await?;
        debug!(table_count = schema.tables.len(), "Schema context gathered");

        let system_prompt = {
            let mut cache = self
                .prompt_cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            cache.get_or_build(&schema)
        };
        let messages = build_messages(&system_prompt, question);

        let llm_start = Instant::now();
        let response = self.generate_with_retry(&selected, &messages).await?;
        debug!(
            llm_duration_ms = llm_start.elapsed().as_millis() as u64,
            response_len = response.len(),
            provider = %selected.provider,
            "Received provider response"
        );

        let Some(candidate) = extract_candidate_sql(&response) else {
            return Err(AskdbError::upstream(format!(
                "provider returned no SQL: {}",
                snippet(&response)
            )));
        };
        debug!(sql = %candidate, "Candidate query obtained");

        let validator = QueryValidator::new(schema.table_names());
        let accepted = match validator.validate(&candidate) {
            Verdict::Accepted(statement) => statement,
            Verdict::Rejected { code, detail } => {
                info!(code = %code, "Candidate query rejected");
                return Err(AskdbError::Validation { code, detail });
            }
        };

        let outcome = QueryExecutor::new(self.db.as_ref()).run(&accepted).await?;
        let chart_data = build_chart_data(&outcome.result);

        info!(
            total_duration_ms = start.elapsed().as_millis() as u64,
            row_count = outcome.result.row_count,
            provider = %selected.provider,
            "Request pipeline complete"
        );

        Ok(Answer {
            sql: accepted.into_string(),
            results: outcome.result.row_maps(),
            chart_data,
        })
    }

    /// Calls the provider under the configured timeout, retrying exactly once
    /// on a transient failure. A second transient failure triggers a
    /// re-probe so the next request re-resolves, then surfaces the error.
    async fn generate_with_retry(
        &self,
        selected: &SelectedProvider,
        messages: &[Message],
    ) -> Result<String> {
        match self.generate_once(selected, messages).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_transient_upstream() => {
                warn!(provider = %selected.provider, error = %e, "Provider call failed transiently, retrying once");
                match self.generate_once(selected, messages).await {
                    Ok(response) => Ok(response),
                    Err(retry_err) => {
                        if retry_err.is_transient_upstream() {
                            if let Err(probe_err) = self.selector.re_probe().await {
                                warn!(error = %probe_err, "Re-probe after repeated failure found no provider");
                            }
                        }
                        Err(retry_err)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn generate_once(
        &self,
        selected: &SelectedProvider,
        messages: &[Message],
    ) -> Result<String> {
        tokio::time::timeout(self.provider_timeout, selected.client.complete(messages))
            .await
            .map_err(|_| {
                AskdbError::timeout(format!(
                    "provider call exceeded {} seconds",
                    self.provider_timeout.as_secs()
                ))
            })?
    }
}

/// First line of a response, bounded, for error messages.
fn snippet(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    let mut out: String = line.chars().take(120).collect();
    if out.len() < line.len() {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ColumnInfo, MockDatabaseClient, QueryResult, Value};
    use crate::llm::{LlmProvider, MockLlmClient};
    use crate::safety::RejectCode;

    fn count_result() -> QueryResult {
        QueryResult::with_data(
            vec![ColumnInfo::new("total_customers", "INTEGER")],
            vec![vec![Value::Int(500)]],
        )
    }

    fn orchestrator_with(
        db: Arc<MockDatabaseClient>,
        llm: Arc<MockLlmClient>,
    ) -> AgentOrchestrator {
        AgentOrchestrator::new(
            db,
            ProviderSelector::with_client(LlmProvider::Mock, llm),
            &Config::default(),
        )
    }

    #[tokio::test]
    async fn test_answer_count_question_end_to_end() {
        let db = Arc::new(
            MockDatabaseClient::with_sales_tables().with_result("COUNT(*)", count_result()),
        );
        let llm = Arc::new(MockLlmClient::new());
        let orchestrator = orchestrator_with(Arc::clone(&db), llm);

        let answer = orchestrator
            .answer("What is the total number of customers?")
            .await
            .unwrap();

        assert_eq!(answer.sql, "SELECT COUNT(*) AS total_customers FROM customers");
        assert_eq!(answer.results.len(), 1);
        assert_eq!(answer.results[0]["total_customers"], serde_json::json!(500));
        assert_eq!(answer.chart_data.labels, vec!["total_customers"]);
        assert_eq!(answer.chart_data.values, vec![500.0]);
        assert_eq!(db.execute_calls(), 1);
    }

    #[tokio::test]
    async fn test_dangerous_candidate_never_reaches_executor() {
        let db = Arc::new(MockDatabaseClient::with_sales_tables());
        let llm =
            Arc::new(MockLlmClient::new().with_response("destroy", "```sql\nDROP TABLE customers\n```"));
        let orchestrator = orchestrator_with(Arc::clone(&db), llm);

        let err = orchestrator.answer("destroy the customers table").await.unwrap_err();

        match err {
            AskdbError::Validation {
                code: RejectCode::DangerousKeyword(kw),
                ..
            } => assert_eq!(kw, "DROP"),
            other => panic!("expected DangerousKeyword rejection, got {other:?}"),
        }
        assert_eq!(db.execute_calls(), 0);
    }

    #[tokio::test]
    async fn test_stacked_candidate_rejected() {
        let db = Arc::new(MockDatabaseClient::with_sales_tables());
        let llm = Arc::new(MockLlmClient::new().with_response(
            "everything",
            "```sql\nSELECT * FROM customers; DELETE FROM customers\n```",
        ));
        let orchestrator = orchestrator_with(Arc::clone(&db), llm);

        let err = orchestrator.answer("select everything twice").await.unwrap_err();

        match err {
            AskdbError::Validation { code, .. } => assert_eq!(code, RejectCode::MultiStatement),
            other => panic!("expected MultiStatement rejection, got {other:?}"),
        }
        assert_eq!(db.execute_calls(), 0);
    }

    #[tokio::test]
    async fn test_no_provider_fails_before_touching_database() {
        let db = Arc::new(MockDatabaseClient::with_sales_tables());
        let orchestrator = AgentOrchestrator::new(
            Arc::clone(&db) as Arc<dyn DatabaseClient>,
            ProviderSelector::new(vec![]),
            &Config::default(),
        );

        let err = orchestrator.answer("How many customers?").await.unwrap_err();

        assert_eq!(err.code(), "no_provider_available");
        assert_eq!(db.list_table_calls(), 0);
        assert_eq!(db.execute_calls(), 0);
    }

    #[tokio::test]
    async fn test_catalog_failure_aborts_pipeline() {
        let db = Arc::new(MockDatabaseClient::with_broken_catalog());
        let llm = Arc::new(MockLlmClient::new());
        let orchestrator = orchestrator_with(Arc::clone(&db), Arc::clone(&llm));

        let err = orchestrator.answer("How many customers?").await.unwrap_err();

        assert_eq!(err.code(), "catalog_unavailable");
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_transient_provider_failure_retried_once() {
        let db = Arc::new(
            MockDatabaseClient::with_sales_tables().with_result("COUNT(*)", count_result()),
        );
        let llm = Arc::new(MockLlmClient::new().with_transient_failures(1));
        let orchestrator = orchestrator_with(Arc::clone(&db), Arc::clone(&llm));

        let answer = orchestrator
            .answer("What is the total number of customers?")
            .await
            .unwrap();

        assert_eq!(llm.calls(), 2);
        assert_eq!(answer.results.len(), 1);
    }

    #[tokio::test]
    async fn test_permanent_provider_failure_not_retried() {
        let db = Arc::new(MockDatabaseClient::with_sales_tables());
        let llm = Arc::new(MockLlmClient::new().with_permanent_failure());
        let orchestrator = orchestrator_with(Arc::clone(&db), Arc::clone(&llm));

        let err = orchestrator.answer("How many customers?").await.unwrap_err();

        assert_eq!(err.code(), "upstream_error");
        assert_eq!(llm.calls(), 1);
        assert_eq!(db.execute_calls(), 0);
    }

    #[tokio::test]
    async fn test_two_transient_failures_surface_error() {
        let db = Arc::new(MockDatabaseClient::with_sales_tables());
        let llm = Arc::new(MockLlmClient::new().with_transient_failures(2));
        let orchestrator = orchestrator_with(Arc::clone(&db), Arc::clone(&llm));

        let err = orchestrator.answer("How many customers?").await.unwrap_err();

        assert!(err.is_transient_upstream());
        assert_eq!(llm.calls(), 2, "exactly one retry, never a loop");
        assert_eq!(db.execute_calls(), 0);
    }

    #[tokio::test]
    async fn test_response_without_sql_is_upstream_error() {
        let db = Arc::new(MockDatabaseClient::with_sales_tables());
        let llm = Arc::new(MockLlmClient::new());
        let orchestrator = orchestrator_with(Arc::clone(&db), llm);

        let err = orchestrator
            .answer("What is the weather like today?")
            .await
            .unwrap_err();

        assert_eq!(err.code(), "upstream_error");
        assert!(err.to_string().contains("no SQL"));
        assert_eq!(db.execute_calls(), 0);
    }

    #[tokio::test]
    async fn test_answer_serializes_to_wire_shape() {
        let db = Arc::new(
            MockDatabaseClient::with_sales_tables().with_result("COUNT(*)", count_result()),
        );
        let llm = Arc::new(MockLlmClient::new());
        let orchestrator = orchestrator_with(db, llm);

        let answer = orchestrator
            .answer("What is the total number of customers?")
            .await
            .unwrap();
        let json = serde_json::to_value(&answer).unwrap();

        assert!(json["sql"].is_string());
        assert!(json["results"].is_array());
        assert_eq!(json["results"][0]["total_customers"], 500);
        assert_eq!(json["chart_data"]["labels"][0], "total_customers");
        assert_eq!(json["chart_data"]["values"][0], 500.0);
    }

    #[test]
    fn test_snippet_bounds_long_lines() {
        let long = "x".repeat(500);
        assert!(snippet(&long).chars().count() <= 121);
        assert_eq!(snippet("short answer\nsecond line"), "short answer");
    }
}
