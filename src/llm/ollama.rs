//! Ollama client implementation.
//!
//! Implements the LlmClient trait for a local Ollama instance, the offline
//! fallback when no hosted provider credential is present.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AskdbError, Result};
use crate::llm::types::Message;
use crate::llm::LlmClient;

/// Default timeout for API requests; local models can be slow.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Timeout for the availability probe.
const PROBE_TIMEOUT_SECS: u64 = 2;

/// Default Ollama API URL.
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama client configuration.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl OllamaConfig {
    /// Creates a new config with the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::new("llama3")
    }
}

/// Ollama LLM client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
}

impl OllamaClient {
    /// Creates a new Ollama client with the given configuration.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AskdbError::upstream(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Creates a client from environment variables.
    ///
    /// Reads `OLLAMA_URL` (defaults to http://localhost:11434) and
    /// `OLLAMA_MODEL` (defaults to "llama3").
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3".to_string());

        Self::new(OllamaConfig::new(model).with_url(base_url))
    }

    /// Checks whether an Ollama instance answers at the configured URL.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        self.client
            .get(&url)
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Converts internal messages to Ollama API format.
    fn convert_messages(messages: &[Message]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|m| OllamaMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    /// Returns the chat API endpoint URL.
    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url)
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(messages),
            stream: false,
        };

        let response = self
            .client
            .post(self.chat_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AskdbError::upstream_transient("Ollama request timed out")
                } else if e.is_connect() {
                    AskdbError::upstream_transient(
                        "Failed to connect to Ollama. Is it running? Try: ollama serve",
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
            let message = format!("Ollama API error ({status}): {body}");
            return if status.is_server_error() {
                Err(AskdbError::upstream_transient(message))
            } else {
                Err(AskdbError::upstream(message))
            };
        }

        let response: OllamaResponse = serde_json::from_str(&body)
            .map_err(|e| AskdbError::upstream(format!("Failed to parse response: {e}")))?;

        Ok(response.message.content)
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}
