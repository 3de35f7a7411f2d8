//! Configuration management for narrative providers
//!
//! Handles API keys, model selection and the per-line narration timeout.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::{BreakerConfig, ChatCompletionsProvider, GuardedProvider, LlmProvider, MockProvider};

/// Default OpenAI model
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
/// Default Mistral model
pub const DEFAULT_MISTRAL_MODEL: &str = "mistral-small-latest";
/// Default narration timeout in milliseconds
pub const DEFAULT_NARRATIVE_TIMEOUT_MS: u64 = 8_000;

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which backend voices an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Mock,
    OpenAi,
    Mistral,
    /// No narration at all
    None,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Mock,
        ProviderKind::OpenAi,
        ProviderKind::Mistral,
        ProviderKind::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Mock => "mock",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Mistral => "mistral",
            ProviderKind::None => "none",
        }
    }

    /// Environment variable holding this provider's key, if it needs one
    pub fn key_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Mistral => Some("MISTRAL_API_KEY"),
            ProviderKind::Mock | ProviderKind::None => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(ProviderKind::Mock),
            "openai" | "gpt" => Ok(ProviderKind::OpenAi),
            "mistral" => Ok(ProviderKind::Mistral),
            "none" | "off" => Ok(ProviderKind::None),
            other => Err(ConfigError::Invalid(format!("unknown provider '{}'", other))),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI API key (env: OPENAI_API_KEY)
    pub openai_api_key: Option<String>,
    /// Mistral API key (env: MISTRAL_API_KEY)
    pub mistral_api_key: Option<String>,
    /// OpenAI model (env: ARENA_OPENAI_MODEL)
    pub openai_model: String,
    /// Mistral model (env: ARENA_MISTRAL_MODEL)
    pub mistral_model: String,
    /// Per-line narration timeout (env: ARENA_NARRATIVE_TIMEOUT_MS)
    pub narrative_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            mistral_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            mistral_model: DEFAULT_MISTRAL_MODEL.to_string(),
            narrative_timeout_ms: DEFAULT_NARRATIVE_TIMEOUT_MS,
        }
    }
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            openai_api_key: non_empty("OPENAI_API_KEY"),
            mistral_api_key: non_empty("MISTRAL_API_KEY"),
            openai_model: non_empty("ARENA_OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            mistral_model: non_empty("ARENA_MISTRAL_MODEL")
                .unwrap_or_else(|| DEFAULT_MISTRAL_MODEL.to_string()),
            narrative_timeout_ms: non_empty("ARENA_NARRATIVE_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_NARRATIVE_TIMEOUT_MS),
        }
    }

    /// Get API key for a provider
    pub fn api_key(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
            ProviderKind::Mistral => self.mistral_api_key.as_deref(),
            ProviderKind::Mock | ProviderKind::None => None,
        }
    }

    /// Check if a provider is configured
    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        kind.key_var().is_none() || self.api_key(kind).is_some()
    }

    /// List available providers
    pub fn available_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.is_configured(*kind))
            .collect()
    }

    /// Model a provider will be asked for
    pub fn model_for(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::OpenAi => &self.openai_model,
            ProviderKind::Mistral => &self.mistral_model,
            ProviderKind::Mock => "mock",
            ProviderKind::None => "none",
        }
    }

    /// Build a provider for `kind`.
    ///
    /// Hosted providers come wrapped in a circuit breaker. `None` yields
    /// `Ok(None)`: the agent stays silent.
    pub fn build_provider(
        &self,
        kind: ProviderKind,
    ) -> Result<Option<Arc<dyn LlmProvider>>, ConfigError> {
        let hosted = match kind {
            ProviderKind::None => return Ok(None),
            ProviderKind::Mock => {
                tracing::debug!(provider = "smart-mock", "Narrative provider ready");
                return Ok(Some(Arc::new(MockProvider::smart())));
            }
            ProviderKind::OpenAi => {
                ChatCompletionsProvider::openai(self.require_key(kind)?, &self.openai_model)
            }
            ProviderKind::Mistral => {
                ChatCompletionsProvider::mistral(self.require_key(kind)?, &self.mistral_model)
            }
        };
        tracing::debug!(
            provider = %hosted.name(),
            model = %hosted.model(),
            "Narrative provider ready"
        );
        Ok(Some(Arc::new(GuardedProvider::new(hosted, self.breaker_config()))))
    }

    /// Breaker tuning for hosted voices. The per-call deadline lands just
    /// inside the narrative timeout so the breaker sees overruns first.
    pub fn breaker_config(&self) -> BreakerConfig {
        let deadline = self.narrative_timeout_ms.saturating_mul(9) / 10;
        BreakerConfig::default().with_call_timeout(Duration::from_millis(deadline.max(1)))
    }

    fn require_key(&self, kind: ProviderKind) -> Result<&str, ConfigError> {
        self.api_key(kind).ok_or_else(|| {
            ConfigError::MissingEnvVar(kind.key_var().unwrap_or_default().to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.narrative_timeout_ms, 8_000);
        assert!(config.is_configured(ProviderKind::Mock));
        assert!(!config.is_configured(ProviderKind::OpenAi));
    }

    #[test]
    fn test_from_lookup() {
        let config = LlmConfig::from_lookup(lookup(&[
            ("MISTRAL_API_KEY", "m-key"),
            ("OPENAI_API_KEY", "  "),
            ("ARENA_MISTRAL_MODEL", "mistral-large-latest"),
            ("ARENA_NARRATIVE_TIMEOUT_MS", "2500"),
        ]));

        assert_eq!(config.api_key(ProviderKind::Mistral), Some("m-key"));
        assert_eq!(config.api_key(ProviderKind::OpenAi), None);
        assert_eq!(config.model_for(ProviderKind::Mistral), "mistral-large-latest");
        assert_eq!(config.narrative_timeout_ms, 2500);
        assert_eq!(
            config.available_providers(),
            vec![ProviderKind::Mock, ProviderKind::Mistral, ProviderKind::None]
        );
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("none".parse::<ProviderKind>().unwrap(), ProviderKind::None);
        assert!(matches!(
            "llama".parse::<ProviderKind>(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_build_provider_requires_key() {
        let config = LlmConfig::default();

        let err = config.build_provider(ProviderKind::OpenAi).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "OPENAI_API_KEY"));

        assert!(config.build_provider(ProviderKind::None).unwrap().is_none());
        let mock = config.build_provider(ProviderKind::Mock).unwrap().unwrap();
        assert_eq!(mock.name(), "smart-mock");
    }

    #[test]
    fn test_hosted_provider_is_wrapped() {
        let config = LlmConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")]));
        let provider = config.build_provider(ProviderKind::OpenAi).unwrap().unwrap();
        assert_eq!(provider.name(), "breaker(openai)");
    }

    #[test]
    fn test_breaker_deadline_inside_narrative_timeout() {
        let config = LlmConfig::from_lookup(lookup(&[("ARENA_NARRATIVE_TIMEOUT_MS", "2000")]));
        assert_eq!(config.breaker_config().call_timeout, Duration::from_millis(1800));
    }
}
