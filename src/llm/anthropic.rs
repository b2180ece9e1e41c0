//! Anthropic client implementation.
//!
//! Implements the LlmClient trait for Anthropic's messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AskdbError, Result};
use crate::llm::types::{Message, Role};
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Anthropic API base URL.
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Maximum tokens to generate; a single SELECT never needs more.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic client configuration.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl AnthropicConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Anthropic LLM client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicClient {
    /// Creates a new Anthropic client with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AskdbError::upstream(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Creates a client from environment variables.
    ///
    /// Reads `ANTHROPIC_API_KEY`; `ANTHROPIC_MODEL` overrides the default
    /// model.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| AskdbError::upstream("ANTHROPIC_API_KEY environment variable not set"))?;

        let model = std::env::var("ANTHROPIC_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());

        Self::new(AnthropicConfig::new(api_key, model))
    }

    /// Extracts the system message and converts the rest to Anthropic format.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system = None;
        let mut converted = Vec::new();

        for msg in messages {
            match msg.role {
                // Anthropic takes the system prompt as a separate parameter.
                Role::System => system = Some(msg.content.clone()),
                Role::User | Role::Assistant => converted.push(AnthropicMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                }),
            }
        }

        (system, converted)
    }

    /// Maps an API error response onto the upstream error taxonomy.
    fn parse_error(status: reqwest::StatusCode, body: &str) -> AskdbError {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return AskdbError::upstream("Authentication failed. Check your ANTHROPIC_API_KEY.");
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return AskdbError::upstream_transient("Rate limited. Please wait and try again.");
        }

        let message = serde_json::from_str::<AnthropicErrorResponse>(body)
            .map(|r| format!("Anthropic API error: {}", r.error.message))
            .unwrap_or_else(|_| format!("Anthropic API error ({status}): {body}"));

        if status.is_server_error() {
            AskdbError::upstream_transient(message)
        } else {
            AskdbError::upstream(message)
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let (system, converted_messages) = Self::convert_messages(messages);

        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system,
            messages: converted_messages,
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AskdbError::upstream_transient("Anthropic request timed out")
                } else if e.is_connect() {
                    AskdbError::upstream_transient(
                        "Failed to connect to the Anthropic API. Check your network.",
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

        let response: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| AskdbError::upstream(format!("Failed to parse response: {e}")))?;

        let text = response
            .content
            .into_iter()
            .filter_map(|block| (block.content_type == "text").then_some(block.text))
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(AskdbError::upstream("No response from Anthropic"));
        }

        Ok(text)
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    message: String,
}
