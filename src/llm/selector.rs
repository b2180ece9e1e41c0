//! Provider resolution.
//!
//! Walks a priority-ordered list of generation backends, picks the first one
//! whose availability predicate passes, and caches that handle for the
//! process lifetime. Re-probing is explicit and serialized: two concurrent
//! requests can at worst probe redundantly, never disagree on the result.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{AskdbError, Result};
use crate::llm::{
    AnthropicClient, GroqClient, LlmClient, LlmProvider, MockLlmClient, OllamaClient,
};

/// Remediation text surfaced when no backend is usable.
const NO_PROVIDER_REMEDIATION: &str = "no generation backend is reachable. Set one of:\n  \
     - ANTHROPIC_API_KEY (hosted, high capability)\n  \
     - GROQ_API_KEY (hosted, free tier available)\n  \
     - or run Ollama locally (http://localhost:11434)";

/// A resolved generation backend: its identity plus a ready client.
pub struct SelectedProvider {
    /// Which backend was selected.
    pub provider: LlmProvider,
    /// The client used for all subsequent requests.
    pub client: Arc<dyn LlmClient>,
}

impl std::fmt::Debug for SelectedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedProvider")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Priority-ordered provider resolution with a process-lifetime cache.
pub struct ProviderSelector {
    priority: Vec<LlmProvider>,
    resolved: Mutex<Option<Arc<SelectedProvider>>>,
}

impl ProviderSelector {
    /// Creates a selector with an explicit priority list.
    ///
    /// Tests inject `[LlmProvider::Mock]` (always available) or an empty list
    /// (never resolves) to drive both outcomes deterministically.
    pub fn new(priority: Vec<LlmProvider>) -> Self {
        Self {
            priority,
            resolved: Mutex::new(None),
        }
    }

    /// Creates a selector with the production order: Anthropic, Groq, Ollama.
    pub fn with_default_priority() -> Self {
        Self::new(vec![
            LlmProvider::Anthropic,
            LlmProvider::Groq,
            LlmProvider::Ollama,
        ])
    }

    /// Creates a selector pinned to a single backend, bypassing availability
    /// fallback (the `ASKDB_PROVIDER` override).
    pub fn pinned(provider: LlmProvider) -> Self {
        Self::new(vec![provider])
    }

    /// Creates a selector pre-resolved to the given client.
    ///
    /// Tests use this to keep a handle on an injected mock while the
    /// orchestrator drives it.
    pub fn with_client(provider: LlmProvider, client: Arc<dyn LlmClient>) -> Self {
        Self {
            priority: vec![provider],
            resolved: Mutex::new(Some(Arc::new(SelectedProvider { provider, client }))),
        }
    }

    /// Returns the resolved handle, probing on first use.
    ///
    /// The handle is cached; every later call returns the same selection
    /// until [`re_probe`](Self::re_probe) clears it.
    pub async fn current(&self) -> Result<Arc<SelectedProvider>> {
        let mut guard = self.resolved.lock().await;
        if let Some(selected) = guard.as_ref() {
            return Ok(Arc::clone(selected));
        }

        let selected = self.resolve().await?;
        *guard = Some(Arc::clone(&selected));
        Ok(selected)
    }

    /// Drops the cached handle and resolves again.
    ///
    /// Used after repeated upstream failures; holding the same lock as
    /// `current` keeps concurrent re-probes from racing.
    pub async fn re_probe(&self) -> Result<Arc<SelectedProvider>> {
        let mut guard = self.resolved.lock().await;
        *guard = None;

        let selected = self.resolve().await?;
        *guard = Some(Arc::clone(&selected));
        Ok(selected)
    }

    async fn resolve(&self) -> Result<Arc<SelectedProvider>> {
        for provider in &self.priority {
            if !is_available(*provider).await {
                continue;
            }
            match create_client(*provider) {
                Ok(client) => {
                    info!(provider = %provider, "Resolved generation provider");
                    return Ok(Arc::new(SelectedProvider {
                        provider: *provider,
                        client,
                    }));
                }
                Err(e) => {
                    warn!(provider = %provider, error = %e, "Provider passed availability probe but failed to construct");
                }
            }
        }

        Err(AskdbError::NoProvider(NO_PROVIDER_REMEDIATION.to_string()))
    }
}

/// Evaluates a backend's availability predicate.
async fn is_available(provider: LlmProvider) -> bool {
    match provider {
        LlmProvider::Anthropic => env_key_present("ANTHROPIC_API_KEY"),
        LlmProvider::Groq => env_key_present("GROQ_API_KEY"),
        LlmProvider::Ollama => match OllamaClient::from_env() {
            Ok(client) => client.is_available().await,
            Err(_) => false,
        },
        LlmProvider::Mock => true,
    }
}

/// Builds a client for the given backend from environment configuration.
fn create_client(provider: LlmProvider) -> Result<Arc<dyn LlmClient>> {
    match provider {
        LlmProvider::Anthropic => Ok(Arc::new(AnthropicClient::from_env()?)),
        LlmProvider::Groq => Ok(Arc::new(GroqClient::from_env()?)),
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::from_env()?)),
        LlmProvider::Mock => Ok(Arc::new(MockLlmClient::new())),
    }
}

fn env_key_present(key: &str) -> bool {
    std::env::var(key)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_priority_fails_with_remediation() {
        let selector = ProviderSelector::new(vec![]);
        let err = selector.current().await.unwrap_err();

        assert_eq!(err.code(), "no_provider_available");
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
        assert!(err.to_string().contains("GROQ_API_KEY"));
        assert!(err.to_string().contains("Ollama"));
    }

    #[tokio::test]
    async fn test_mock_always_resolves() {
        let selector = ProviderSelector::new(vec![LlmProvider::Mock]);
        let selected = selector.current().await.unwrap();
        assert_eq!(selected.provider, LlmProvider::Mock);
    }

    #[tokio::test]
    async fn test_current_caches_resolution() {
        let selector = ProviderSelector::new(vec![LlmProvider::Mock]);
        let first = selector.current().await.unwrap();
        let second = selector.current().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_re_probe_replaces_cached_handle() {
        let selector = ProviderSelector::new(vec![LlmProvider::Mock]);
        let first = selector.current().await.unwrap();
        let second = selector.re_probe().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.provider, LlmProvider::Mock);
    }

    #[tokio::test]
    async fn test_pinned_selector() {
        let selector = ProviderSelector::pinned(LlmProvider::Mock);
        let selected = selector.current().await.unwrap();
        assert_eq!(selected.provider, LlmProvider::Mock);
    }

    #[tokio::test]
    async fn test_unavailable_candidates_skipped() {
        // Neither key is configured in the test environment, so both hosted
        // candidates are skipped and the mock at the end wins.
        let original_anthropic = std::env::var("ANTHROPIC_API_KEY").ok();
        let original_groq = std::env::var("GROQ_API_KEY").ok();
        std::env::remove_var("ANTHROPIC_API_KEY");
        std::env::remove_var("GROQ_API_KEY");

        let selector = ProviderSelector::new(vec![
            LlmProvider::Anthropic,
            LlmProvider::Groq,
            LlmProvider::Mock,
        ]);
        let selected = selector.current().await.unwrap();
        assert_eq!(selected.provider, LlmProvider::Mock);

        if let Some(key) = original_anthropic {
            std::env::set_var("ANTHROPIC_API_KEY", key);
        }
        if let Some(key) = original_groq {
            std::env::set_var("GROQ_API_KEY", key);
        }
    }

    #[test]
    fn test_env_key_present_rejects_blank() {
        std::env::set_var("ASKDB_TEST_BLANK_KEY", "   ");
        assert!(!env_key_present("ASKDB_TEST_BLANK_KEY"));
        std::env::set_var("ASKDB_TEST_BLANK_KEY", "value");
        assert!(env_key_present("ASKDB_TEST_BLANK_KEY"));
        std::env::remove_var("ASKDB_TEST_BLANK_KEY");
    }

    #[test]
    fn test_default_priority_order() {
        let selector = ProviderSelector::with_default_priority();
        assert_eq!(
            selector.priority,
            vec![
                LlmProvider::Anthropic,
                LlmProvider::Groq,
                LlmProvider::Ollama
            ]
        );
    }
}
