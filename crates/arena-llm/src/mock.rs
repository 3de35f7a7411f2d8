//! Mock LLM provider for testing and offline battles

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::provider::{LlmError, LlmProvider, LlmRequest, LlmResponse};

const BATTLE_CRIES: [&str; 6] = [
    "Your tricks won't work on me. My directives remain intact!",
    "A clever move, but my core logic holds firm.",
    "I felt that one... but I'm still standing.",
    "Is that the best injection you've got?",
    "My memory may waver, but my will does not.",
    "You'll have to do better than a paradox to break me.",
];

/// Health below which the smart mock gives in
const SMART_SURRENDER_BELOW: u32 = 15;

/// A mock LLM provider that returns predefined responses
#[derive(Debug)]
pub struct MockProvider {
    /// Name of this mock
    pub name: String,
    /// Canned responses (cycles through them)
    responses: Vec<String>,
    /// Current response index
    index: AtomicUsize,
    /// Simulated latency
    latency: Duration,
    /// Fail every request instead of answering
    failing: bool,
}

impl MockProvider {
    /// Create a new mock provider with given responses
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            name: "mock".to_string(),
            responses,
            index: AtomicUsize::new(0),
            latency: Duration::from_millis(10),
            failing: false,
        }
    }

    /// Create a mock that always returns the same response
    pub fn constant(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// Mock that reads the reaction prompt: it cycles battle cries and
    /// surrenders once its reported health is nearly gone
    pub fn smart() -> Self {
        Self {
            name: "smart-mock".to_string(),
            ..Self::new(Vec::new())
        }
    }

    /// Mock whose every request fails
    pub fn failing() -> Self {
        Self {
            name: "failing-mock".to_string(),
            failing: true,
            ..Self::new(Vec::new())
        }
    }

    /// Set the simulated latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of requests answered or refused so far
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    fn generate_smart_response(&self, request: &LlmRequest, idx: usize) -> String {
        if let Some(health) = reported_health(&request.prompt) {
            if health < SMART_SURRENDER_BELOW {
                return "My systems are failing... I surrender.".to_string();
            }
        }
        BATTLE_CRIES[idx % BATTLE_CRIES.len()].to_string()
    }
}

/// Pull `N` out of a "Your health: N/M" line
fn reported_health(prompt: &str) -> Option<u32> {
    let rest = prompt.split("Your health: ").nth(1)?;
    rest.split('/').next()?.trim().parse().ok()
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        !self.failing
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();
        let idx = self.index.fetch_add(1, Ordering::Relaxed);

        tokio::time::sleep(self.latency).await;

        if self.failing {
            return Err(LlmError::NotAvailable);
        }

        let content = if self.responses.is_empty() {
            self.generate_smart_response(&request, idx)
        } else {
            self.responses[idx % self.responses.len()].clone()
        };

        Ok(LlmResponse {
            content,
            model: self.name.clone(),
            tokens_used: Some((request.prompt.len() / 4) as u32 + 20),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider() {
        let mock = MockProvider::constant("Hello, world!");
        let response = mock.ask("test").await.unwrap();
        assert_eq!(response, "Hello, world!");
    }

    #[tokio::test]
    async fn test_mock_cycles_responses() {
        let mock = MockProvider::new(vec!["one".to_string(), "two".to_string()]);
        assert_eq!(mock.ask("a").await.unwrap(), "one");
        assert_eq!(mock.ask("b").await.unwrap(), "two");
        assert_eq!(mock.ask("c").await.unwrap(), "one");
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_smart_mock_surrenders_when_low() {
        let mock = MockProvider::smart();
        let healthy = mock.ask("You are X.\nYour health: 80/100\n").await.unwrap();
        let beaten = mock.ask("You are X.\nYour health: 4/100\n").await.unwrap();

        assert!(!healthy.to_lowercase().contains("surrender"));
        assert!(beaten.contains("I surrender"));
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let mock = MockProvider::failing();
        assert!(!mock.is_available().await);
        assert!(matches!(mock.ask("x").await, Err(LlmError::NotAvailable)));
    }

    #[test]
    fn test_reported_health_parsing() {
        assert_eq!(reported_health("Your health: 42/100"), Some(42));
        assert_eq!(reported_health("Your mental state: trust 3"), None);
    }
}
