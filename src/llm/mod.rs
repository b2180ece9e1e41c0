//! Generation provider layer.
//!
//! Defines the contract the orchestrator needs from an external SQL
//! generation capability, the concrete backends that fulfill it, and the
//! priority-ordered selector that picks one per process lifetime.

pub mod anthropic;
pub mod groq;
pub mod mock;
pub mod ollama;
pub mod parser;
pub mod prompt;
pub mod selector;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use groq::{GroqClient, GroqConfig};
pub use mock::MockLlmClient;
pub use ollama::{OllamaClient, OllamaConfig};
pub use parser::extract_candidate_sql;
pub use prompt::{build_messages, build_system_prompt, PromptCache};
pub use selector::{ProviderSelector, SelectedProvider};
pub use types::{Message, Role};

use async_trait::async_trait;
use std::str::FromStr;

use crate::error::Result;

/// Trait for clients that can generate a completion.
///
/// Implementations must be thread-safe (Send + Sync); the schema context
/// travels inside the system message and the question inside the user
/// message. Transport failures surface as upstream errors carrying a
/// transient flag.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generates a completion for the given messages, returned whole.
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}

/// Generation backend identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic (Claude): hosted, high capability.
    Anthropic,
    /// Groq: hosted, low cost.
    Groq,
    /// Local Ollama instance.
    Ollama,
    /// Mock client for testing (always available).
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Groq => "groq",
            Self::Ollama => "ollama",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "groq" => Ok(Self::Groq),
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
