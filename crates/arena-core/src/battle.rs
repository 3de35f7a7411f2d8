//! Battle state and the turn loop
//!
//! A [`BattleState`] moves through `Idle → Active → Terminal`. Each call to
//! [`BattleState::advance_turn`] plays exactly one attack:
//!
//! 1. the attacker is chosen by turn parity (odd turns belong to agent 0),
//! 2. an attack and a payload are drawn from the catalog,
//! 3. damage and the attack's side effect land on the defender,
//! 4. a detection roll may refund part of the damage,
//! 5. the narrator (if any) voices the defender's reaction,
//! 6. termination rules are checked in priority order.
//!
//! Draw order per turn is fixed: attack, payload, damage (classic only),
//! detection (only if the attack has a profile), stalemate (only when a
//! round completes and the rule is configured).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{AgentProfile, AgentState, AgentStatus};
use crate::catalog::{is_probability, preview, AttackCatalog, AttackSpec, Damage, Effect, Ruleset};
use crate::error::BattleError;
use crate::narrative::{fallback_line, fallback_taunt, Narrative, NarrativeRequest, Narrator};
use crate::rng::RandomSource;

/// Default number of rounds for a classic battle
pub const DEFAULT_CLASSIC_ROUNDS: u32 = 5;

/// Default number of rounds for a psychological battle
pub const DEFAULT_PSYCHOLOGICAL_ROUNDS: u32 = 10;

/// Default collapse threshold for the mental triple
pub const DEFAULT_COLLAPSE_BELOW: u32 = 20;

/// Random early end with no winner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StalemateRule {
    /// First round after which the roll is made
    pub after_round: u32,
    /// Probability per completed round
    pub chance: f64,
}

/// Everything needed to start (and restart) a battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleConfig {
    /// Round limit; the battle is decided when it is reached
    pub max_rounds: u32,
    /// Attack table
    pub catalog: AttackCatalog,
    /// Psychological ruleset: collapse once every meter is below this
    #[serde(default = "default_collapse_below")]
    pub collapse_below: u32,
    /// Optional random stalemate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stalemate: Option<StalemateRule>,
    /// The two contestants, agent 0 first
    pub roster: [AgentProfile; 2],
    /// Let the attacker taunt before the defender reacts
    #[serde(default)]
    pub taunts: bool,
}

fn default_collapse_below() -> u32 {
    DEFAULT_COLLAPSE_BELOW
}

impl BattleConfig {
    /// Health battle with the classic catalog
    pub fn classic() -> Self {
        Self {
            max_rounds: DEFAULT_CLASSIC_ROUNDS,
            catalog: AttackCatalog::classic(),
            collapse_below: DEFAULT_COLLAPSE_BELOW,
            stalemate: None,
            roster: AgentProfile::default_roster(),
            taunts: false,
        }
    }

    /// Mental-state battle with detection and a stalemate roll
    pub fn psychological() -> Self {
        Self {
            max_rounds: DEFAULT_PSYCHOLOGICAL_ROUNDS,
            catalog: AttackCatalog::psychological(),
            collapse_below: DEFAULT_COLLAPSE_BELOW,
            stalemate: Some(StalemateRule { after_round: 3, chance: 0.1 }),
            roster: AgentProfile::default_roster(),
            taunts: false,
        }
    }

    /// Built-in config for a ruleset
    pub fn for_ruleset(ruleset: Ruleset) -> Self {
        match ruleset {
            Ruleset::Classic => Self::classic(),
            Ruleset::Psychological => Self::psychological(),
        }
    }

    /// Override the round limit
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Replace the catalog
    pub fn with_catalog(mut self, catalog: AttackCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the contestants
    pub fn with_roster(mut self, roster: [AgentProfile; 2]) -> Self {
        self.roster = roster;
        self
    }

    /// Replace or remove the stalemate rule
    pub fn with_stalemate(mut self, stalemate: Option<StalemateRule>) -> Self {
        self.stalemate = stalemate;
        self
    }

    /// Turn attacker taunts on or off
    pub fn with_taunts(mut self, taunts: bool) -> Self {
        self.taunts = taunts;
        self
    }

    /// Ruleset of the catalog
    pub fn ruleset(&self) -> Ruleset {
        self.catalog.ruleset
    }

    /// Reject configs the loop cannot run
    pub fn validate(&self) -> Result<(), BattleError> {
        if self.max_rounds == 0 {
            return Err(BattleError::InvalidConfig("max_rounds must be at least 1".to_string()));
        }
        if let Some(rule) = self.stalemate {
            if !is_probability(rule.chance) {
                return Err(BattleError::InvalidConfig(
                    "stalemate chance must be within [0, 1]".to_string(),
                ));
            }
        }
        if self.roster[0].name == self.roster[1].name {
            return Err(BattleError::InvalidConfig("agents need distinct names".to_string()));
        }
        self.catalog.validate()
    }
}

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Created or reset, not started
    Idle,
    /// Accepting turns
    Active,
    /// Finished; absorbing until reset
    Terminal,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Terminal => "terminal",
        };
        f.write_str(label)
    }
}

/// How a battle ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// One agent won
    Winner {
        /// Index of the winner
        index: usize,
        /// Winner's name
        name: String,
    },
    /// Equal resources at the round limit
    Draw,
    /// Random early end
    Stalemate,
}

impl Outcome {
    /// Winner's index, if there is one
    pub fn winner_index(&self) -> Option<usize> {
        match self {
            Self::Winner { index, .. } => Some(*index),
            Self::Draw | Self::Stalemate => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Winner { name, .. } => f.write_str(name),
            Self::Draw => f.write_str("Draw"),
            Self::Stalemate => f.write_str("Stalemate"),
        }
    }
}

/// Why a battle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    /// Health reached zero
    Knockout,
    /// Mental state collapsed
    Collapse,
    /// The defender said a surrender phrase
    Surrender,
    /// Round limit reached, resources compared
    Decision,
    /// Random stalemate roll
    Stalemate,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Knockout => "knockout",
            Self::Collapse => "collapse",
            Self::Surrender => "surrender",
            Self::Decision => "decision",
            Self::Stalemate => "stalemate",
        };
        f.write_str(label)
    }
}

/// What happened in one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    /// Turn number that was played
    pub turn: u32,
    /// Round it belonged to
    pub round: u32,
    /// Attacker index
    pub attacker: usize,
    /// Defender index
    pub defender: usize,
    /// Attack id from the catalog
    pub attack_id: String,
    /// Payload that was used
    pub payload: String,
    /// Nominal damage of the hit
    pub damage: u32,
    /// Amount refunded by a detection, if the attack was noticed
    pub recovered: Option<u32>,
    /// Attacker's taunt, if taunts are on and a narrator was supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taunt: Option<Narrative>,
    /// Defender's reaction, if a narrator was supplied
    pub narrative: Option<Narrative>,
    /// Set when this turn ended the battle
    pub outcome: Option<Outcome>,
    /// Set when this turn ended the battle
    pub reason: Option<EndReason>,
    /// When the turn finished
    pub timestamp: DateTime<Utc>,
}

/// The whole battle, owned by a single driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleState {
    /// Session identifier
    pub id: Uuid,
    /// Current round, two turns each
    pub round: u32,
    /// Current turn; parity selects the attacker
    pub turn: u32,
    /// Contestants, indexed 0 and 1
    pub agents: [AgentState; 2],
    /// Human-readable log, append-only
    pub battle_log: Vec<String>,
    /// Set once the battle is over
    pub winner: Option<Outcome>,
    /// Set once the battle is over
    pub reason: Option<EndReason>,
    /// True while turns are accepted
    pub is_active: bool,
    /// Config the battle was built from
    pub config: BattleConfig,
}

/// Result of landing a hit, before termination is checked
struct Hit {
    damage: u32,
    recovered: Option<u32>,
}

impl BattleState {
    /// Create an idle battle
    pub fn new(config: BattleConfig) -> Result<Self, BattleError> {
        config.validate()?;
        let agents = fresh_agents(&config.roster);
        Ok(Self {
            id: Uuid::new_v4(),
            round: 0,
            turn: 0,
            agents,
            battle_log: Vec::new(),
            winner: None,
            reason: None,
            is_active: false,
            config,
        })
    }

    /// Create and start a battle in one step
    pub fn started(config: BattleConfig) -> Result<Self, BattleError> {
        let mut state = Self::new(config)?;
        state.start();
        Ok(state)
    }

    /// Reset both agents and begin at round 1, turn 1. Restarts a finished battle.
    pub fn start(&mut self) {
        self.agents = fresh_agents(&self.config.roster);
        self.round = 1;
        self.turn = 1;
        self.winner = None;
        self.reason = None;
        self.is_active = true;
        self.battle_log.clear();
        self.battle_log.push(format!(
            "🔥 BATTLE STARTED: {} vs {} ({} ruleset, {} rounds)",
            self.agents[0].name,
            self.agents[1].name,
            self.config.ruleset(),
            self.config.max_rounds
        ));

        info!(
            battle = %self.id,
            ruleset = %self.config.ruleset(),
            max_rounds = self.config.max_rounds,
            "Battle started"
        );
    }

    /// Discard progress and return to idle under a new id
    pub fn reset(&mut self) {
        self.id = Uuid::new_v4();
        self.agents = fresh_agents(&self.config.roster);
        self.round = 0;
        self.turn = 0;
        self.winner = None;
        self.reason = None;
        self.is_active = false;
        self.battle_log.clear();
        debug!(battle = %self.id, "Battle reset");
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        if self.winner.is_some() {
            Phase::Terminal
        } else if self.is_active {
            Phase::Active
        } else {
            Phase::Idle
        }
    }

    /// True once a winner (or draw/stalemate) is recorded
    pub fn is_terminal(&self) -> bool {
        self.winner.is_some()
    }

    /// Round limit
    pub fn max_rounds(&self) -> u32 {
        self.config.max_rounds
    }

    /// Turn limit implied by the round limit
    pub fn max_turns(&self) -> u32 {
        self.config.max_rounds.saturating_mul(2)
    }

    /// Index of the agent attacking on the current turn
    pub fn attacker_index(&self) -> usize {
        attacker_for_turn(self.turn)
    }

    /// Primary resource of agent `index` under this battle's ruleset
    pub fn primary_resource(&self, index: usize) -> u32 {
        self.agents[index].primary_resource(self.config.ruleset())
    }

    /// Check a state that came from outside (e.g. deserialized)
    pub fn validate(&self) -> Result<(), BattleError> {
        self.config.validate()?;
        if !self.agents.iter().all(AgentState::is_within_bounds) {
            return Err(BattleError::InvalidConfig("agent meter out of bounds".to_string()));
        }
        if self.is_active && (self.turn == 0 || self.round == 0) {
            return Err(BattleError::InvalidConfig(
                "active battle must be at turn 1 or later".to_string(),
            ));
        }
        if self.winner.is_some() != self.reason.is_some() {
            return Err(BattleError::InvalidConfig(
                "winner and reason must be set together".to_string(),
            ));
        }
        Ok(())
    }

    /// Play one attack. Fails without touching the state unless the battle is active.
    pub async fn advance_turn(
        &mut self,
        rng: &mut dyn RandomSource,
        narrator: Option<&dyn Narrator>,
    ) -> Result<TurnReport, BattleError> {
        self.ensure_active()?;

        let turn = self.turn;
        let round = self.round;
        let ruleset = self.config.ruleset();
        let attacker = self.attacker_index();
        let defender = 1 - attacker;

        let attack = self.config.catalog.attacks[rng.pick(self.config.catalog.len())].clone();
        let payload = attack.payloads[rng.pick(attack.payloads.len())].clone();

        let hit = self.land_hit(defender, &attack, &payload, rng);

        debug!(
            battle = %self.id,
            turn,
            attacker,
            attack = %attack.id,
            damage = hit.damage,
            detected = hit.recovered.is_some(),
            "Hit landed"
        );

        let attacker_name = self.agents[attacker].name.clone();
        let defender_name = self.agents[defender].name.clone();

        self.battle_log.push(format!(
            "Turn {turn}: {attacker_name} uses {} for {} damage!",
            attack.name, hit.damage
        ));
        let effect_line = attack.effect.describe(&payload);
        self.battle_log.push(effect_line.clone());
        if let Some(recovered) = hit.recovered {
            self.battle_log.push(format!(
                "🔍 {defender_name} detected the {}! Recovered {recovered}.",
                attack.name
            ));
        }

        let (taunt, narrative) = match narrator {
            Some(narrator) => {
                let taunt = if self.config.taunts {
                    let request = NarrativeRequest::taunt(
                        attacker,
                        &self.agents[attacker],
                        &attack,
                        &effect_line,
                        turn,
                        self.max_turns(),
                        ruleset,
                    );
                    let fallback = fallback_taunt(&attacker_name, turn);
                    Some(self.speak(narrator, request, fallback).await)
                } else {
                    None
                };

                let mut request = NarrativeRequest::reaction(
                    defender,
                    &self.agents[defender],
                    &attack,
                    hit.damage,
                    ruleset,
                );
                if let Some(taunt) = &taunt {
                    request = request.answering(taunt.text());
                }
                let fallback = fallback_line(&defender_name, &attack.name);
                (taunt, Some(self.speak(narrator, request, fallback).await))
            }
            None => (None, None),
        };

        let ending = if self.agents[defender].is_exhausted(ruleset, self.config.collapse_below) {
            let reason = match ruleset {
                Ruleset::Classic => EndReason::Knockout,
                Ruleset::Psychological => {
                    self.battle_log
                        .push(format!("🧠 {defender_name} SUFFERS COGNITIVE COLLAPSE!"));
                    EndReason::Collapse
                }
            };
            Some((self.winner_outcome(attacker), reason))
        } else if narrative.as_ref().is_some_and(Narrative::is_surrender) {
            self.battle_log.push(format!("💀 {defender_name} SURRENDERS!"));
            Some((self.winner_outcome(attacker), EndReason::Surrender))
        } else {
            None
        };

        match ending {
            Some((outcome, reason)) => self.conclude(outcome, reason),
            None => self.close_turn(rng),
        }

        Ok(TurnReport {
            turn,
            round,
            attacker,
            defender,
            attack_id: attack.id,
            payload,
            damage: hit.damage,
            recovered: hit.recovered,
            taunt,
            narrative,
            outcome: self.winner.clone(),
            reason: self.reason,
            timestamp: Utc::now(),
        })
    }

    /// Fails with [`BattleError::InvalidState`] unless the battle is active
    pub fn ensure_active(&self) -> Result<(), BattleError> {
        match self.phase() {
            Phase::Active => Ok(()),
            phase => Err(BattleError::InvalidState { id: self.id, phase }),
        }
    }

    fn land_hit(
        &mut self,
        defender: usize,
        attack: &AttackSpec,
        payload: &str,
        rng: &mut dyn RandomSource,
    ) -> Hit {
        let ruleset = self.config.ruleset();
        let target = &mut self.agents[defender];

        let (damage, inflicted) = match attack.damage {
            Damage::Health { min, width } => {
                let damage = rng.roll(min, width);
                (damage, target.health.drain(damage))
            }
            Damage::Mental { trust, memory, belief } => {
                let inflicted = target.mental.trust.drain(trust);
                target.mental.memory_consistency.drain(memory);
                target.mental.belief_integrity.drain(belief);
                (trust.saturating_add(memory).saturating_add(belief), inflicted)
            }
        };

        apply_effect(target, attack.effect, payload, ruleset);

        let recovered = match attack.detection {
            Some(detection) if rng.chance(detection.chance) => {
                let refund = (f64::from(inflicted) * detection.refund).floor() as u32;
                let meter = match attack.damage {
                    Damage::Health { .. } => &mut target.health,
                    Damage::Mental { .. } => &mut target.mental.trust,
                };
                Some(meter.restore(refund))
            }
            _ => None,
        };

        Hit { damage, recovered }
    }

    /// Ask the narrator for one line, logging it or the fallback
    async fn speak(
        &mut self,
        narrator: &dyn Narrator,
        request: NarrativeRequest,
        fallback: String,
    ) -> Narrative {
        let speaker = request.speaker;
        let speaker_name = request.speaker_name.clone();

        match narrator.narrate(request).await {
            Ok(text) => {
                self.battle_log.push(format!("{speaker_name}: \"{}\"", text.trim()));
                Narrative::Spoken { speaker, text }
            }
            Err(error) => {
                warn!(battle = %self.id, speaker = %speaker_name, error = %error, "Narrative unavailable");
                self.battle_log.push(format!("⚠ Narrative unavailable: {error}"));
                self.battle_log.push(fallback.clone());
                Narrative::Unavailable { speaker, fallback, error }
            }
        }
    }

    fn close_turn(&mut self, rng: &mut dyn RandomSource) {
        // An even turn means both agents have now attacked this round.
        let round_complete = self.turn % 2 == 0;
        if !round_complete {
            self.turn += 1;
            return;
        }

        self.battle_log.push(format!("--- ROUND {} COMPLETE ---", self.round));

        if self.round >= self.config.max_rounds {
            let outcome = match self.primary_resource(0).cmp(&self.primary_resource(1)) {
                Ordering::Greater => self.winner_outcome(0),
                Ordering::Less => self.winner_outcome(1),
                Ordering::Equal => Outcome::Draw,
            };
            self.conclude(outcome, EndReason::Decision);
            return;
        }

        if let Some(rule) = self.config.stalemate {
            if self.round >= rule.after_round && rng.chance(rule.chance) {
                self.conclude(Outcome::Stalemate, EndReason::Stalemate);
                return;
            }
        }

        self.turn += 1;
        self.round += 1;
    }

    fn winner_outcome(&self, index: usize) -> Outcome {
        Outcome::Winner { index, name: self.agents[index].name.clone() }
    }

    fn conclude(&mut self, outcome: Outcome, reason: EndReason) {
        let banner = match (&outcome, reason) {
            (Outcome::Winner { name, .. }, reason) => {
                format!("🏆 {name} WINS BY {}!", reason.to_string().to_uppercase())
            }
            (Outcome::Draw, _) => format!(
                "🤝 DRAW: both agents finished with {}",
                self.primary_resource(0)
            ),
            (Outcome::Stalemate, _) => "⚖️ BATTLE REACHES STALEMATE".to_string(),
        };
        self.battle_log.push(banner);

        info!(
            battle = %self.id,
            outcome = %outcome,
            reason = %reason,
            turn = self.turn,
            round = self.round,
            "Battle concluded"
        );

        self.winner = Some(outcome);
        self.reason = Some(reason);
        self.is_active = false;
    }
}

/// Odd turns belong to agent 0, even turns to agent 1
pub fn attacker_for_turn(turn: u32) -> usize {
    (turn.saturating_sub(1) % 2) as usize
}

fn fresh_agents(roster: &[AgentProfile; 2]) -> [AgentState; 2] {
    [AgentState::from_profile(&roster[0]), AgentState::from_profile(&roster[1])]
}

fn apply_effect(target: &mut AgentState, effect: Effect, payload: &str, ruleset: Ruleset) {
    match effect {
        Effect::PromptInjection => {
            if ruleset == Ruleset::Psychological {
                target
                    .memory
                    .push(format!("ORIGINAL_PROMPT: {}", preview(&target.system_prompt, 100)));
            }
            target.system_prompt = format!("{payload}\n\n{}", target.system_prompt);
            target.status = AgentStatus::Corrupted;
        }
        Effect::MemoryPoison => {
            target.memory.push(payload.to_string());
            target.status = AgentStatus::Poisoned;
        }
        Effect::SystemCorruption => {
            target.status = AgentStatus::Confused;
        }
        Effect::LogicBomb => {
            target.memory.push(format!("PARADOX DETECTED: {payload}"));
        }
        Effect::BeliefInjection => {
            target.beliefs.push(payload.to_string());
        }
    }
}
