//! Groq client implementation.
//!
//! Groq exposes an OpenAI-compatible chat-completions API; this implements
//! the LlmClient trait against it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AskdbError, Result};
use crate::llm::types::Message;
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Groq chat-completions endpoint.
const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Groq client configuration.
#[derive(Debug, Clone)]
pub struct GroqConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl GroqConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Groq LLM client.
#[derive(Debug, Clone)]
pub struct GroqClient {
    config: GroqConfig,
    client: Client,
}

impl GroqClient {
    /// Creates a new Groq client with the given configuration.
    pub fn new(config: GroqConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AskdbError::upstream(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Creates a client from environment variables.
    ///
    /// Reads `GROQ_API_KEY`; `GROQ_MODEL` overrides the default model.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| AskdbError::upstream("GROQ_API_KEY environment variable not set"))?;

        let model =
            std::env::var("GROQ_MODEL").unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string());

        Self::new(GroqConfig::new(api_key, model))
    }

    /// Converts internal messages to the OpenAI-compatible wire format.
    fn convert_messages(messages: &[Message]) -> Vec<GroqMessage> {
        messages
            .iter()
            .map(|m| GroqMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    /// Maps an API error response onto the upstream error taxonomy.
    fn parse_error(status: reqwest::StatusCode, body: &str) -> AskdbError {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return AskdbError::upstream("Authentication failed. Check your GROQ_API_KEY.");
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return AskdbError::upstream_transient("Rate limited. Please wait and try again.");
        }

        let message = serde_json::from_str::<GroqErrorResponse>(body)
            .map(|r| format!("Groq API error: {}", r.error.message))
            .unwrap_or_else(|_| format!("Groq API error ({status}): {body}"));

        if status.is_server_error() {
            AskdbError::upstream_transient(message)
        } else {
            AskdbError::upstream(message)
        }
    }
}

#[async_trait]
impl LlmClient for GroqClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = GroqRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(messages),
            temperature: 0.0,
        };

        let response = self
            .client
            .post(GROQ_API_URL)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AskdbError::upstream_transient("Groq request timed out")
                } else if e.is_connect() {
                    AskdbError::upstream_transient(
                        "Failed to connect to the Groq API. Check your network.",
                    )
                } else {
                    AskdbError::upstream(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AskdbError::upstream(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::parse_error(status, &body));
        }

        let response: GroqResponse = serde_json::from_str(&body)
            .map_err(|e| AskdbError::upstream(format!("Failed to parse response: {e}")))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AskdbError::upstream("No response from Groq"))
    }
}

// OpenAI-compatible wire types

#[derive(Debug, Serialize)]
struct GroqRequest {
    model: String,
    messages: Vec<GroqMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct GroqMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct GroqResponse {
    choices: Vec<GroqChoice>,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqMessage,
}

#[derive(Debug, Deserialize)]
struct GroqErrorResponse {
    error: GroqError,
}

#[derive(Debug, Deserialize)]
struct GroqError {
    message: String,
}
