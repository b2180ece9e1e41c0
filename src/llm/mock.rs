//! Mock LLM client for testing.
//!
//! Deterministic canned responses plus scripted failures, so orchestrator
//! tests can exercise the bounded-retry and no-SQL paths without a network.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{AskdbError, Result};
use crate::llm::types::{Message, Role};
use crate::llm::LlmClient;

/// Mock LLM client that returns canned responses based on input patterns.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response), checked first.
    custom_responses: Vec<(String, String)>,
    /// Number of leading calls that fail with a transient upstream error.
    transient_failures: AtomicUsize,
    /// When set, every call fails with a permanent upstream error.
    always_fail: bool,
    calls: AtomicUsize,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the last user message contains `pattern`, the mock returns
    /// `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Makes the first `n` calls fail with a transient upstream error.
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Makes every call fail with a permanent upstream error.
    pub fn with_permanent_failure(mut self) -> Self {
        self.always_fail = true;
        self
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Generates a mock response based on the input.
    fn mock_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        if input_lower.contains("customers")
            && (input_lower.contains("how many") || input_lower.contains("total number"))
        {
            return "```sql\nSELECT COUNT(*) AS total_customers FROM customers\n```".to_string();
        }

        if input_lower.contains("revenue") && input_lower.contains("category") {
            return "```sql\nSELECT p.category, ROUND(SUM(p.price * oi.quantity), 2) AS revenue \
                    FROM products p JOIN order_items oi ON p.id = oi.product_id \
                    GROUP BY p.category ORDER BY revenue DESC\n```"
                .to_string();
        }

        "This question cannot be answered with the available schema.".to_string()
    }

    /// Extracts the last user message content from a message list.
    fn extract_user_input(messages: &[Message]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.always_fail {
            return Err(AskdbError::upstream("mock permanent failure"));
        }

        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(AskdbError::upstream_transient("mock transient failure"));
        }

        let input = Self::extract_user_input(messages);
        Ok(self.mock_response(&input))
    }
}
