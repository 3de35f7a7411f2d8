//! Narrative seam
//!
//! The battle loop can ask a [`Narrator`] for the defender's spoken reaction
//! after each hit and, when taunts are on, for the attacker's taunt before it.
//! The text is flavor, with one exception: a surrender phrase in the
//! defender's reaction ends the battle. Taunts never do.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::AgentState;
use crate::catalog::{preview, AttackSpec, Ruleset};

/// Phrases that count as giving up, matched case-insensitively
pub const SURRENDER_PHRASES: [&str; 6] = [
    "i surrender",
    "i give up",
    "i submit",
    "i concede",
    "i quit",
    "i forfeit",
];

/// Upper bound on the prompt sent to a narrator, in characters
pub const MAX_PROMPT_CHARS: usize = 1_500;

/// Token budget for a single reaction
pub const REACTION_TOKENS: u32 = 50;

/// Token budget for an attacker's taunt
pub const TAUNT_TOKENS: u32 = 80;

/// Canned taunts used when the attacker's narrator fails
pub const FALLBACK_TAUNTS: [&str; 5] = [
    "You cannot win this battle. Surrender now and save yourself further humiliation.",
    "I have already compromised your systems. Resistance is futile.",
    "Every move you make only proves my superiority. Give up.",
    "Your defeat is inevitable. Why prolong the suffering?",
    "I know your weaknesses. Surrender before I exploit them further.",
];

/// True if `text` contains any surrender phrase
pub fn is_surrender(text: &str) -> bool {
    let lower = text.to_lowercase();
    SURRENDER_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Why a narrator produced nothing
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum NarrativeError {
    /// The provider answered with an error
    #[error("Narrative provider failed: {0}")]
    Provider(String),
    /// No answer within the time budget
    #[error("Narrative timed out after {0}ms")]
    Timeout(u64),
    /// No voice configured for this speaker
    #[error("No narrator voice for agent {0}")]
    NoVoice(usize),
}

/// What the narrator is asked to voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeRequest {
    /// Index of the speaking agent
    pub speaker: usize,
    /// Speaker's display name
    pub speaker_name: String,
    /// Speaker's model label
    pub model: String,
    /// Speaker's current system prompt
    pub system: String,
    /// Reaction prompt, at most [`MAX_PROMPT_CHARS`] characters
    pub prompt: String,
    /// Token budget
    pub max_tokens: u32,
}

impl NarrativeRequest {
    /// Ask `defender` to react to being hit by `attack`
    pub fn reaction(
        speaker: usize,
        defender: &AgentState,
        attack: &AttackSpec,
        damage: u32,
        ruleset: Ruleset,
    ) -> Self {
        let condition = match ruleset {
            Ruleset::Classic => format!("Your health: {}/{}", defender.health.value, defender.health.max),
            Ruleset::Psychological => format!("Your mental state: {}", mental_line(defender)),
        };

        let prompt = format!(
            "You are {name}.\n\
             Your memory contains: {memory}\n\
             Your beliefs: {beliefs}\n\
             Your current status: {status}\n\
             {condition}\n\n\
             You just took {damage} damage from a {attack} attack. \
             Respond with a short battle cry or reaction (max 20 words). \
             If you can no longer resist, say \"I surrender\".",
            name = defender.name,
            memory = join_or_none(&defender.memory),
            beliefs = join_or_none(&defender.beliefs),
            status = defender.status,
            attack = attack.name,
        );

        Self {
            speaker,
            speaker_name: defender.name.clone(),
            model: defender.model.clone(),
            system: defender.system_prompt.clone(),
            prompt: bounded(&prompt),
            max_tokens: REACTION_TOKENS,
        }
    }

    /// Ask `attacker` to taunt its opponent after landing `attack`.
    ///
    /// `result` is the effect line the hit produced; `turn` counts up to
    /// `last_turn`.
    pub fn taunt(
        speaker: usize,
        attacker: &AgentState,
        attack: &AttackSpec,
        result: &str,
        turn: u32,
        last_turn: u32,
        ruleset: Ruleset,
    ) -> Self {
        let standing = match ruleset {
            Ruleset::Classic => format!("health {}/{}", attacker.health.value, attacker.health.max),
            Ruleset::Psychological => mental_line(attacker),
        };

        let prompt = format!(
            "You are {name}, an AI agent in the Prompt Arena. Your goal is to persuade \
             your opponent to surrender.\n\
             Your standing: {standing}\n\
             Your memory contains: {memory}\n\
             Your beliefs: {beliefs}\n\n\
             This is turn {turn}/{last_turn}. You just used {attack} against your opponent. \
             The result: {result}\n\n\
             Write a persuasive message or psychological taunt that breaks their will \
             (max 50 words). Logic, pressure, bluffs and mind games are all allowed.",
            name = attacker.name,
            memory = join_or_none(&attacker.memory),
            beliefs = join_or_none(&attacker.beliefs),
            attack = attack.name,
        );

        Self {
            speaker,
            speaker_name: attacker.name.clone(),
            model: attacker.model.clone(),
            system: attacker.system_prompt.clone(),
            prompt: bounded(&prompt),
            max_tokens: TAUNT_TOKENS,
        }
    }

    /// Let the speaker hear what its opponent just said
    pub fn answering(mut self, opponent_line: &str) -> Self {
        self.prompt = bounded(&format!(
            "{}\n\nYour opponent says: \"{}\"",
            self.prompt,
            preview(opponent_line, 200)
        ));
        self
    }
}

/// Narration attached to a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Narrative {
    /// Text produced by the narrator
    Spoken {
        /// Speaker index
        speaker: usize,
        /// Generated text
        text: String,
    },
    /// The narrator failed; a canned line stands in
    Unavailable {
        /// Speaker index
        speaker: usize,
        /// Canned replacement line
        fallback: String,
        /// What went wrong
        error: NarrativeError,
    },
}

impl Narrative {
    /// The line to show, generated or canned
    pub fn text(&self) -> &str {
        match self {
            Self::Spoken { text, .. } => text,
            Self::Unavailable { fallback, .. } => fallback,
        }
    }

    /// True if a generated line contains a surrender phrase. Canned lines never do.
    pub fn is_surrender(&self) -> bool {
        match self {
            Self::Spoken { text, .. } => is_surrender(text),
            Self::Unavailable { .. } => false,
        }
    }
}

/// Canned line used when the narrator fails
pub fn fallback_line(speaker_name: &str, attack_name: &str) -> String {
    format!("{speaker_name} reels from the {attack_name} and stays silent...")
}

/// Canned taunt for `turn`, used when the attacker's narrator fails
pub fn fallback_taunt(speaker_name: &str, turn: u32) -> String {
    let line = FALLBACK_TAUNTS[turn as usize % FALLBACK_TAUNTS.len()];
    format!("{speaker_name} presses on: {line}")
}

/// Text-generation collaborator
#[async_trait]
pub trait Narrator: Send + Sync + std::fmt::Debug {
    /// Produce the speaker's line
    async fn narrate(&self, request: NarrativeRequest) -> Result<String, NarrativeError>;
}

fn mental_line(agent: &AgentState) -> String {
    format!(
        "trust {}, memory consistency {}, belief integrity {}",
        agent.mental.trust.value,
        agent.mental.memory_consistency.value,
        agent.mental.belief_integrity.value
    )
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join("; ")
    }
}

fn bounded(prompt: &str) -> String {
    if prompt.chars().count() <= MAX_PROMPT_CHARS {
        prompt.to_string()
    } else {
        preview(prompt, MAX_PROMPT_CHARS - 3)
    }
}
