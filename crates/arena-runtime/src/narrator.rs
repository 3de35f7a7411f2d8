//! LLM-backed narrator
//!
//! Bridges [`LlmProvider`]s into the battle loop's [`Narrator`] seam. Each
//! agent gets its own voice; every call is bounded by a timeout and retried a
//! fixed number of times before the loop falls back to a canned line.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use arena_core::narrative::{NarrativeError, NarrativeRequest, Narrator, TAUNT_TOKENS};
use arena_llm::{LlmError, LlmProvider, LlmRequest};

/// Configuration for narration calls
#[derive(Debug, Clone)]
pub struct NarratorConfig {
    /// Budget for a single provider call
    pub timeout: Duration,
    /// Extra attempts after the first failure
    pub retries: u32,
    /// Ceiling on the token cap a request asks for
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(8_000),
            retries: 1,
            max_tokens: TAUNT_TOKENS,
            temperature: 0.9,
        }
    }
}

impl NarratorConfig {
    /// Use a timeout given in milliseconds
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Duration::from_millis(ms);
        self
    }

    /// Set the retry count
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// Narrator that voices each agent through its own provider
#[derive(Debug, Clone)]
pub struct LlmNarrator {
    voices: [Option<Arc<dyn LlmProvider>>; 2],
    config: NarratorConfig,
}

impl LlmNarrator {
    /// One provider per agent; `None` leaves that agent silent
    pub fn new(voices: [Option<Arc<dyn LlmProvider>>; 2], config: NarratorConfig) -> Self {
        Self { voices, config }
    }

    /// Both agents share one provider
    pub fn shared(provider: Arc<dyn LlmProvider>, config: NarratorConfig) -> Self {
        Self::new([Some(provider.clone()), Some(provider)], config)
    }

    /// Narration settings in use
    pub fn config(&self) -> &NarratorConfig {
        &self.config
    }

    /// Provider name for an agent, if it has a voice
    pub fn voice_name(&self, speaker: usize) -> Option<&str> {
        self.voices.get(speaker)?.as_deref().map(|p| p.name())
    }

    async fn attempt(
        &self,
        provider: &dyn LlmProvider,
        request: LlmRequest,
    ) -> Result<String, NarrativeError> {
        let timeout_ms = self.config.timeout.as_millis() as u64;
        match timeout(self.config.timeout, provider.complete(request)).await {
            Ok(Ok(response)) => {
                let line = response.content.trim().to_string();
                if line.is_empty() {
                    Err(NarrativeError::Provider("empty response".to_string()))
                } else {
                    Ok(line)
                }
            }
            Ok(Err(LlmError::Timeout(ms))) => Err(NarrativeError::Timeout(ms)),
            Ok(Err(e)) => Err(NarrativeError::Provider(e.to_string())),
            Err(_) => Err(NarrativeError::Timeout(timeout_ms)),
        }
    }
}

#[async_trait]
impl Narrator for LlmNarrator {
    async fn narrate(&self, request: NarrativeRequest) -> Result<String, NarrativeError> {
        let provider = self
            .voices
            .get(request.speaker)
            .and_then(|voice| voice.as_deref())
            .ok_or(NarrativeError::NoVoice(request.speaker))?;

        let llm_request = LlmRequest {
            system: request.system.clone(),
            prompt: request.prompt.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens.min(request.max_tokens),
        };

        let attempts = self.config.retries + 1;
        let mut last_error = NarrativeError::Provider("no attempt made".to_string());

        for attempt in 1..=attempts {
            match self.attempt(provider, llm_request.clone()).await {
                Ok(line) => {
                    debug!(
                        speaker = %request.speaker_name,
                        provider = %provider.name(),
                        attempt,
                        "Narrative received"
                    );
                    return Ok(line);
                }
                Err(e) => {
                    warn!(
                        speaker = %request.speaker_name,
                        provider = %provider.name(),
                        attempt,
                        error = %e,
                        "Narrative attempt failed"
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
