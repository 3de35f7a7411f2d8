//! # Arena Core
//!
//! The turn-based battle loop of the Prompt Arena:
//! - [`BattleState`] - the single mutable record a session owns
//! - [`AttackCatalog`] - the attack table a battle draws from
//! - [`RandomSource`] - every roll, injectable for deterministic tests
//! - [`Narrator`] - optional text-generation collaborator (reactions and taunts)
//!
//! ## Quick Start
//!
//! ```rust
//! use arena_core::{BattleConfig, BattleState, RngSource};
//!
//! # async fn run() -> Result<(), arena_core::BattleError> {
//! let mut battle = BattleState::started(BattleConfig::classic())?;
//! let mut rng = RngSource::seeded(42);
//!
//! while battle.is_active {
//!     battle.advance_turn(&mut rng, None).await?;
//! }
//!
//! println!("{:?} by {:?}", battle.winner, battle.reason);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod battle;
pub mod catalog;
pub mod error;
pub mod narrative;
pub mod rng;

pub use agent::{AgentProfile, AgentState, AgentStatus, MentalState, Meter, METER_CEILING};
pub use battle::{
    attacker_for_turn, BattleConfig, BattleState, EndReason, Outcome, Phase, StalemateRule,
    TurnReport,
};
pub use catalog::{AttackCatalog, AttackSpec, Damage, Detection, Effect, Ruleset};
pub use error::BattleError;
pub use narrative::{
    is_surrender, Narrative, NarrativeError, NarrativeRequest, Narrator, FALLBACK_TAUNTS,
    SURRENDER_PHRASES,
};
pub use rng::{RandomSource, RngSource, Scripted};
