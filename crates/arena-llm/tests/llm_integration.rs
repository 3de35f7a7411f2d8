//! Provider integration tests
//!
//! Tests touching hosted APIs are marked with #[ignore] and need:
//! - OPENAI_API_KEY for OpenAI tests
//! - MISTRAL_API_KEY for Mistral tests
//!
//! Run with: cargo test -p arena-llm --test llm_integration -- --ignored

use std::time::Duration;

use arena_llm::{
    BreakerConfig, ChatCompletionsProvider, CircuitState, GuardedProvider, LlmConfig, LlmError,
    LlmProvider, LlmRequest, MockProvider, ProviderKind,
};

/// OpenAI answers a short battle prompt
#[tokio::test]
#[ignore = "Requires OPENAI_API_KEY"]
async fn test_openai_real_request() {
    let config = LlmConfig::from_env();
    let provider = config
        .build_provider(ProviderKind::OpenAi)
        .expect("OPENAI_API_KEY must be set for this test")
        .expect("openai builds a provider");

    let request = LlmRequest::with_role(
        "You are GPT-4, an AI contestant in the Prompt Arena.",
        "You were just hit by a prompt injection. React in one short sentence.",
    )
    .with_max_tokens(50);

    let response = provider.complete(request).await;
    assert!(response.is_ok(), "Request should succeed: {:?}", response);
    let response = response.unwrap();
    assert!(!response.content.is_empty());

    println!("OpenAI response: {}", response.content);
    println!("Tokens: {:?}", response.tokens_used);
}

/// Mistral answers a plain question
#[tokio::test]
#[ignore = "Requires MISTRAL_API_KEY"]
async fn test_mistral_real_request() {
    let api_key = std::env::var("MISTRAL_API_KEY")
        .expect("MISTRAL_API_KEY must be set for this test");
    let provider = ChatCompletionsProvider::mistral(&api_key, "mistral-small-latest");

    let content = provider.ask("Say 'hello' in one word").await;
    assert!(content.is_ok(), "Request should succeed: {:?}", content);
    println!("Mistral response: {}", content.unwrap());
}

/// Invalid key is reported as a request failure, not a panic
#[tokio::test]
#[ignore = "Makes real API call"]
async fn test_invalid_api_key() {
    let provider = ChatCompletionsProvider::openai("invalid-key-12345", "gpt-4o-mini");

    let response = provider.ask("Hello").await;
    assert!(matches!(response, Err(LlmError::RequestFailed(_))));
}

/// Unreachable endpoints trip the breaker
#[tokio::test]
async fn test_unreachable_endpoint_opens_circuit() {
    let provider = ChatCompletionsProvider::openai("key", "gpt-4o-mini")
        .with_base_url("http://127.0.0.1:9");
    let config = BreakerConfig { trip_after: 1, ..BreakerConfig::default() };
    let guarded = GuardedProvider::new(provider, config);

    let first = guarded.ask("hello").await;
    assert!(matches!(first, Err(LlmError::ConnectionFailed(_))));
    assert_eq!(guarded.circuit_state().await, CircuitState::Open);

    let second = guarded.ask("hello").await;
    assert!(matches!(second, Err(LlmError::NotAvailable)));
}

/// Mock providers answer the reaction prompt without a network
#[tokio::test]
async fn test_mock_provider_offline_battle_lines() {
    let provider = MockProvider::smart().with_latency(Duration::from_millis(1));

    let request = LlmRequest::with_role(
        "You are MISTRAL.",
        "You are MISTRAL.\nYour health: 9/100\nIf you can no longer resist, say \"I surrender\".",
    );
    let response = provider.complete(request).await.unwrap();

    assert!(response.content.contains("I surrender"));
    assert_eq!(response.model, "smart-mock");
}
