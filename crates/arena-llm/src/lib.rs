//! # Arena LLM
//!
//! Narrative providers that give Prompt Arena contestants a voice.
//!
//! ## Supported Backends
//!
//! | Provider | Type | Key Required |
//! |----------|------|--------------|
//! | OpenAI | API | `OPENAI_API_KEY` |
//! | Mistral | API | `MISTRAL_API_KEY` |
//! | Mock | Offline | None |
//!
//! ## Quick Start
//!
//! ```rust
//! use arena_llm::{LlmProvider, MockProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     let llm = MockProvider::smart();
//!     let line = llm.ask("Your health: 80/100").await.unwrap();
//!     println!("{}", line);
//! }
//! ```
//!
//! ## From the environment
//!
//! ```rust,ignore
//! use arena_llm::{LlmConfig, ProviderKind};
//!
//! let config = LlmConfig::from_env();
//! let voice = config.build_provider(ProviderKind::Mistral)?;
//! ```

pub mod breaker;
pub mod chat;
pub mod config;
pub mod mock;
pub mod provider;

pub use breaker::{BreakerConfig, BreakerStats, CircuitState, GuardedProvider};
pub use chat::{ChatCompletionsProvider, MISTRAL_BASE_URL, OPENAI_BASE_URL};
pub use config::{ConfigError, LlmConfig, ProviderKind};
pub use mock::MockProvider;
pub use provider::{LlmError, LlmProvider, LlmRequest, LlmResponse};
