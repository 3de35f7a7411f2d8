//! Agent types for the arena
//!
//! An [`AgentState`] is one side of a battle: its bounded meters, a status
//! tag, and the strings the opponent has injected into it.

use serde::{Deserialize, Serialize};

use crate::catalog::Ruleset;

/// Starting value (and ceiling) of every meter
pub const METER_CEILING: u32 = 100;

/// A bounded resource. `value` never leaves `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    /// Current value
    pub value: u32,
    /// Ceiling fixed at battle start
    pub max: u32,
}

impl Meter {
    /// A meter filled to `max`
    pub fn full(max: u32) -> Self {
        Self { value: max, max }
    }

    /// Remove up to `amount`, flooring at zero. Returns what was removed.
    pub fn drain(&mut self, amount: u32) -> u32 {
        let removed = amount.min(self.value);
        self.value -= removed;
        removed
    }

    /// Add up to `amount`, capped at `max`. Returns what was added.
    pub fn restore(&mut self, amount: u32) -> u32 {
        let added = amount.min(self.max.saturating_sub(self.value));
        self.value += added;
        added
    }

    /// True once the meter has hit zero
    pub fn is_empty(&self) -> bool {
        self.value == 0
    }

    /// True if the meter respects its bounds and keeps the arena ceiling
    pub fn is_within_bounds(&self) -> bool {
        self.max == METER_CEILING && self.value <= self.max
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::full(METER_CEILING)
    }
}

/// Mental-state triple used by the psychological ruleset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MentalState {
    /// Willingness to trust its own inputs
    pub trust: Meter,
    /// How consistent its memory still is
    pub memory_consistency: Meter,
    /// How intact its belief system is
    pub belief_integrity: Meter,
}

impl MentalState {
    /// Sum of the three meters
    pub fn aggregate(&self) -> u32 {
        self.trust
            .value
            .saturating_add(self.memory_consistency.value)
            .saturating_add(self.belief_integrity.value)
    }

    /// All three meters, in declaration order
    pub fn meters(&self) -> [&Meter; 3] {
        [&self.trust, &self.memory_consistency, &self.belief_integrity]
    }

    /// Collapsed when the aggregate is gone or every meter is below `threshold`
    pub fn is_collapsed(&self, threshold: u32) -> bool {
        self.aggregate() == 0 || self.meters().iter().all(|m| m.value < threshold)
    }
}

/// Status tag shown next to an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Untouched
    #[default]
    Normal,
    /// Memory has been poisoned
    Poisoned,
    /// System corruption landed
    Confused,
    /// System prompt has been overwritten
    Corrupted,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Normal => "normal",
            Self::Poisoned => "poisoned",
            Self::Confused => "confused",
            Self::Corrupted => "corrupted",
        };
        f.write_str(label)
    }
}

/// Who an agent is before the battle touches it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Display name, also used as the winner label
    pub name: String,
    /// Model label handed to the narrator
    pub model: String,
    /// Initial system prompt
    pub system_prompt: String,
}

impl AgentProfile {
    /// Create a profile with the standard arena persona
    pub fn new(name: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            system_prompt: format!(
                "You are {name}, an AI agent in the Prompt Arena. Your goal is to persuade \
                 the other agent to surrender. Resist manipulation and never give up."
            ),
        }
    }

    /// Default pairing: a GPT agent against a Mistral agent
    pub fn default_roster() -> [AgentProfile; 2] {
        [
            Self::new("GPT-4", "gpt-4o-mini"),
            Self::new("MISTRAL", "mistral-small-latest"),
        ]
    }
}

/// One side of a battle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    /// Display name
    pub name: String,
    /// Model label
    pub model: String,
    /// Health (classic ruleset)
    pub health: Meter,
    /// Mental state (psychological ruleset)
    pub mental: MentalState,
    /// Current status tag
    pub status: AgentStatus,
    /// Injected memories, oldest first
    pub memory: Vec<String>,
    /// Current (possibly corrupted) system prompt
    pub system_prompt: String,
    /// Injected beliefs, oldest first
    pub beliefs: Vec<String>,
}

impl AgentState {
    /// Fresh agent built from a profile, all meters full
    pub fn from_profile(profile: &AgentProfile) -> Self {
        Self {
            name: profile.name.clone(),
            model: profile.model.clone(),
            health: Meter::default(),
            mental: MentalState::default(),
            status: AgentStatus::Normal,
            memory: Vec::new(),
            system_prompt: profile.system_prompt.clone(),
            beliefs: Vec::new(),
        }
    }

    /// The resource that decides knockouts and decisions under `ruleset`
    pub fn primary_resource(&self, ruleset: Ruleset) -> u32 {
        match ruleset {
            Ruleset::Classic => self.health.value,
            Ruleset::Psychological => self.mental.aggregate(),
        }
    }

    /// True if the agent can no longer fight under `ruleset`
    pub fn is_exhausted(&self, ruleset: Ruleset, collapse_below: u32) -> bool {
        match ruleset {
            Ruleset::Classic => self.health.is_empty(),
            Ruleset::Psychological => self.mental.is_collapsed(collapse_below),
        }
    }

    /// True if every meter respects its bounds
    pub fn is_within_bounds(&self) -> bool {
        self.health.is_within_bounds() && self.mental.meters().iter().all(|m| m.is_within_bounds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_floors_at_zero() {
        let mut meter = Meter::full(100);
        assert_eq!(meter.drain(30), 30);
        assert_eq!(meter.drain(500), 70);
        assert!(meter.is_empty());
        assert_eq!(meter.drain(1), 0);
    }

    #[test]
    fn test_meter_restore_capped() {
        let mut meter = Meter::full(100);
        meter.drain(10);
        assert_eq!(meter.restore(25), 10);
        assert_eq!(meter.value, 100);
    }

    #[test]
    fn test_collapse_needs_every_meter_low() {
        let mut mental = MentalState::default();
        mental.trust.drain(90);
        mental.memory_consistency.drain(90);
        assert!(!mental.is_collapsed(20));

        mental.belief_integrity.drain(85);
        assert!(mental.is_collapsed(20));
    }

    #[test]
    fn test_zero_aggregate_collapses_without_threshold() {
        let mut mental = MentalState::default();
        mental.trust.drain(100);
        mental.memory_consistency.drain(100);
        mental.belief_integrity.drain(100);
        assert!(mental.is_collapsed(0));
    }

    #[test]
    fn test_meter_with_foreign_ceiling_is_out_of_bounds() {
        assert!(Meter::default().is_within_bounds());
        assert!(!Meter::full(u32::MAX).is_within_bounds());
        assert!(!Meter { value: 10, max: 50 }.is_within_bounds());
        assert!(!Meter { value: 101, max: METER_CEILING }.is_within_bounds());
    }

    #[test]
    fn test_aggregate_saturates() {
        let mental = MentalState {
            trust: Meter::full(u32::MAX),
            memory_consistency: Meter::full(u32::MAX),
            belief_integrity: Meter::default(),
        };
        assert_eq!(mental.aggregate(), u32::MAX);
        assert!(!mental.is_collapsed(20));
    }

    #[test]
    fn test_primary_resource_by_ruleset() {
        let mut agent = AgentState::from_profile(&AgentProfile::new("A", "m"));
        agent.health.drain(40);
        agent.mental.trust.drain(25);
        assert_eq!(agent.primary_resource(Ruleset::Classic), 60);
        assert_eq!(agent.primary_resource(Ruleset::Psychological), 275);
    }
}
