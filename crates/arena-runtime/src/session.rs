//! Battle session - owns one battle and its random source

use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use arena_core::{BattleConfig, BattleError, BattleState, Narrator, RandomSource, RngSource, TurnReport};

/// Errors from a session
#[derive(Debug, Error)]
pub enum SessionError {
    /// The battle refused the operation
    #[error(transparent)]
    Battle(#[from] BattleError),
    /// Another call is already working on this session
    #[error("Session {0} is busy with another turn")]
    Busy(Uuid),
}

struct SessionInner {
    state: BattleState,
    rng: Box<dyn RandomSource>,
}

/// One battle driven turn by turn.
///
/// At most one call touches the battle at a time; a turn requested while
/// another is still being narrated is rejected with [`SessionError::Busy`].
pub struct BattleSession {
    /// Mirrors `state.id`, readable while a turn holds the lock
    id: RwLock<Uuid>,
    inner: Mutex<SessionInner>,
    narrator: Option<Arc<dyn Narrator>>,
}

impl std::fmt::Debug for BattleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleSession")
            .field("id", &self.id())
            .field("narrator", &self.narrator)
            .finish_non_exhaustive()
    }
}

impl BattleSession {
    /// Create an idle session with an OS-seeded random source
    pub fn new(config: BattleConfig) -> Result<Self, SessionError> {
        Self::with_rng(config, Box::new(RngSource::from_os_rng()))
    }

    /// Create an idle session with the given random source
    pub fn with_rng(config: BattleConfig, rng: Box<dyn RandomSource>) -> Result<Self, SessionError> {
        Ok(Self::from_state(BattleState::new(config)?, rng)?)
    }

    /// Resume a battle that was serialized elsewhere
    pub fn from_state(state: BattleState, rng: Box<dyn RandomSource>) -> Result<Self, BattleError> {
        state.validate()?;
        Ok(Self {
            id: RwLock::new(state.id),
            inner: Mutex::new(SessionInner { state, rng }),
            narrator: None,
        })
    }

    /// Give the agents a voice
    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    /// Id of the battle currently held by the session
    pub fn id(&self) -> Uuid {
        *self.id.read()
    }

    /// Start (or restart) the battle
    pub async fn start(&self) -> Result<BattleState, SessionError> {
        let mut inner = self.try_acquire()?;
        inner.state.start();
        Ok(inner.state.clone())
    }

    /// Discard the battle and return to idle
    pub async fn reset(&self) -> Result<BattleState, SessionError> {
        let mut inner = self.try_acquire()?;
        inner.state.reset();
        *self.id.write() = inner.state.id;
        Ok(inner.state.clone())
    }

    /// Play one turn
    pub async fn advance_turn(&self) -> Result<TurnReport, SessionError> {
        let mut inner = self.try_acquire()?;
        let SessionInner { state, rng } = &mut *inner;
        let report = state.advance_turn(rng.as_mut(), self.narrator.as_deref()).await?;
        Ok(report)
    }

    /// Snapshot of the battle. Waits for an in-flight turn to finish.
    pub async fn current_state(&self) -> BattleState {
        self.inner.lock().await.state.clone()
    }

    /// Play turns until the battle ends, returning every report.
    /// Fails like [`Self::advance_turn`] when the battle is not active.
    pub async fn run_to_completion(&self) -> Result<Vec<TurnReport>, SessionError> {
        let mut inner = self.try_acquire()?;
        let SessionInner { state, rng } = &mut *inner;
        state.ensure_active()?;
        let mut reports = Vec::new();

        while state.is_active {
            reports.push(state.advance_turn(rng.as_mut(), self.narrator.as_deref()).await?);
        }

        info!(
            battle = %state.id,
            turns = reports.len(),
            winner = ?state.winner,
            "Battle finished"
        );
        Ok(reports)
    }

    fn try_acquire(&self) -> Result<tokio::sync::MutexGuard<'_, SessionInner>, SessionError> {
        self.inner.try_lock().map_err(|_| SessionError::Busy(self.id()))
    }
}
