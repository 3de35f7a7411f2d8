//! OpenAI-compatible chat-completions provider
//!
//! OpenAI and Mistral expose the same `/v1/chat/completions` shape, so one
//! client serves both; only the base URL, key and model differ.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::provider::{LlmError, LlmProvider, LlmRequest, LlmResponse};

/// Default OpenAI endpoint
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Default Mistral endpoint
pub const MISTRAL_BASE_URL: &str = "https://api.mistral.ai";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// Hosted chat-completions provider
#[derive(Debug)]
pub struct ChatCompletionsProvider {
    /// Provider label ("openai", "mistral", ...)
    name: String,
    /// API key
    api_key: String,
    /// Model to use
    model: String,
    /// HTTP client
    client: reqwest::Client,
    /// Base URL
    base_url: String,
}

impl ChatCompletionsProvider {
    /// Create a provider for any OpenAI-compatible endpoint
    pub fn new(name: &str, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// OpenAI with the given model (e.g. "gpt-4o-mini")
    pub fn openai(api_key: &str, model: &str) -> Self {
        Self::new("openai", OPENAI_BASE_URL, api_key, model)
    }

    /// Mistral with the given model (e.g. "mistral-small-latest")
    pub fn mistral(api_key: &str, model: &str) -> Self {
        Self::new("mistral", MISTRAL_BASE_URL, api_key, model)
    }

    /// Set a custom base URL (useful for self-hosted or proxy setups)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Model this provider sends requests to
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = ChatRequest {
            model: &self.model,
            messages: [
                Message { role: "system", content: &request.system },
                Message { role: "user", content: &request.prompt },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::RateLimited);
            }

            return Err(LlmError::RequestFailed(format!(
                "Status: {}, Body: {}",
                status, body
            )));
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("no choices returned".to_string()))?;

        tracing::debug!(
            provider = %self.name,
            model = %api_response.model,
            latency_ms = start.elapsed().as_millis() as u64,
            "Chat completion received"
        );

        Ok(LlmResponse {
            content,
            model: api_response.model,
            tokens_used: api_response.usage.map(|u| u.total_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
