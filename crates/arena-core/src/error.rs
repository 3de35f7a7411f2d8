//! Battle errors

use thiserror::Error;
use uuid::Uuid;

use crate::battle::Phase;

/// Errors from the battle loop
#[derive(Debug, Error)]
pub enum BattleError {
    /// A turn was requested on an idle or finished battle
    #[error("Battle {id} cannot advance: it is {phase}")]
    InvalidState {
        /// Battle that rejected the call
        id: Uuid,
        /// Phase it was in
        phase: Phase,
    },
    /// Catalog, roster or serialized state is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
