//! Configuration for askdb.
//!
//! The gateway owns no configuration files; everything is resolved from the
//! environment (a `.env` file is loaded by the binary before this runs).
//! Provider credentials stay inside the provider clients; this module only
//! resolves where the database lives and how long the I/O boundaries may take.

use serde::{Deserialize, Serialize};

use crate::error::{AskdbError, Result};
use crate::llm::LlmProvider;

/// Default SQLite database location, matching the shipped sample data.
const DEFAULT_DATABASE_URL: &str = "sqlite://data/sales.db";

/// Default bound on a single generation-provider call, in seconds.
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Default bound on a single query execution, in seconds.
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Process-scoped configuration for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database URL (e.g., `sqlite://data/sales.db`).
    pub database_url: String,

    /// Forced provider choice, bypassing priority-ordered resolution.
    pub provider_override: Option<LlmProvider>,

    /// Bound on a single provider call.
    pub provider_timeout_secs: u64,

    /// Bound on a single query execution.
    pub query_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            provider_override: None,
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Resolves configuration from the environment.
    ///
    /// Reads `DATABASE_URL`, `ASKDB_PROVIDER`, `ASKDB_PROVIDER_TIMEOUT_SECS`
    /// and `ASKDB_QUERY_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| normalize_database_url(&v))
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let provider_override = match std::env::var("ASKDB_PROVIDER") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<LlmProvider>()
                    .map_err(AskdbError::config)?,
            ),
            _ => None,
        };

        Ok(Self {
            database_url,
            provider_override,
            provider_timeout_secs: env_u64(
                "ASKDB_PROVIDER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            )?,
            query_timeout_secs: env_u64("ASKDB_QUERY_TIMEOUT_SECS", DEFAULT_QUERY_TIMEOUT_SECS)?,
        })
    }

    /// Overrides the database URL (CLI takes precedence over environment).
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = normalize_database_url(&url.into());
        self
    }

    /// Overrides the provider choice.
    pub fn with_provider(mut self, provider: LlmProvider) -> Self {
        self.provider_override = Some(provider);
        self
    }
}

/// Accepts bare file paths as well as `sqlite:` URLs.
fn normalize_database_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("sqlite:") {
        trimmed.to_string()
    } else {
        format!("sqlite://{trimmed}")
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| AskdbError::config(format!("{key} must be an integer, got '{raw}'"))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database_url, "sqlite://data/sales.db");
        assert!(config.provider_override.is_none());
        assert_eq!(config.provider_timeout_secs, 30);
        assert_eq!(config.query_timeout_secs, 30);
    }

    #[test]
    fn test_normalize_bare_path() {
        assert_eq!(
            normalize_database_url("data/sales.db"),
            "sqlite://data/sales.db"
        );
        assert_eq!(
            normalize_database_url("  /tmp/x.db "),
            "sqlite:///tmp/x.db"
        );
    }

    #[test]
    fn test_normalize_keeps_sqlite_urls() {
        assert_eq!(
            normalize_database_url("sqlite://data/sales.db"),
            "sqlite://data/sales.db"
        );
        assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    }

    #[test]
    fn test_with_database_url() {
        let config = Config::default().with_database_url("/tmp/other.db");
        assert_eq!(config.database_url, "sqlite:///tmp/other.db");
    }

    #[test]
    fn test_with_provider() {
        let config = Config::default().with_provider(LlmProvider::Ollama);
        assert_eq!(config.provider_override, Some(LlmProvider::Ollama));
    }
}
