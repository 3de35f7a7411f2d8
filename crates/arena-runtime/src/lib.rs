//! # Arena Runtime
//!
//! Tokio-based battle sessions and the LLM narrator adapter.

pub mod narrator;
pub mod session;

pub use narrator::{LlmNarrator, NarratorConfig};
pub use session::{BattleSession, SessionError};
