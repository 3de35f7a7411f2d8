//! CLI commands and the battle/narration flags they share

pub mod catalog;
pub mod info;
pub mod play;
pub mod turn;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use arena_core::{AgentProfile, AttackCatalog, BattleConfig, Narrator, RandomSource, RngSource, Ruleset};
use arena_llm::{LlmConfig, ProviderKind};
use arena_runtime::{LlmNarrator, NarratorConfig};

/// How a new battle is set up
#[derive(Args, Debug)]
pub struct BattleArgs {
    /// Ruleset: classic or psychological
    #[arg(long, env = "ARENA_RULESET", default_value = "classic")]
    pub ruleset: Ruleset,

    /// Round limit (5 for classic, 10 for psychological)
    #[arg(long, env = "ARENA_ROUNDS")]
    pub rounds: Option<u32>,

    /// JSON attack catalog replacing the built-in one
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Name of the first agent
    #[arg(long, default_value = "GPT-4")]
    pub agent_a: String,

    /// Name of the second agent
    #[arg(long, default_value = "MISTRAL")]
    pub agent_b: String,

    /// Disable the random stalemate roll
    #[arg(long)]
    pub no_stalemate: bool,

    /// Let each attacker taunt before the defender reacts
    #[arg(long, env = "ARENA_TAUNTS")]
    pub taunts: bool,
}

impl BattleArgs {
    /// Build the battle config; hosted voices lend their model label to the agent
    pub async fn config(&self, voices: [ProviderKind; 2], llm: &LlmConfig) -> Result<BattleConfig> {
        let mut config = BattleConfig::for_ruleset(self.ruleset);

        if let Some(path) = &self.catalog {
            config = config.with_catalog(load_catalog(path).await?);
        }
        if let Some(rounds) = self.rounds {
            config = config.with_max_rounds(rounds);
        }
        if self.no_stalemate {
            config = config.with_stalemate(None);
        }
        config = config.with_taunts(self.taunts);

        let defaults = AgentProfile::default_roster();
        let names = [&self.agent_a, &self.agent_b];
        let roster = [0, 1].map(|i| {
            let model = match voices[i] {
                ProviderKind::OpenAi | ProviderKind::Mistral => llm.model_for(voices[i]),
                ProviderKind::Mock | ProviderKind::None => defaults[i].model.as_str(),
            };
            AgentProfile::new(names[i], model)
        });
        config = config.with_roster(roster);

        config.validate().context("Invalid battle setup")?;
        Ok(config)
    }
}

/// Who voices the agents
#[derive(Args, Debug)]
pub struct VoiceArgs {
    /// Voice of the first agent: mock, openai, mistral or none
    #[arg(long, env = "ARENA_VOICE_A", default_value = "mock")]
    pub voice_a: ProviderKind,

    /// Voice of the second agent: mock, openai, mistral or none
    #[arg(long, env = "ARENA_VOICE_B", default_value = "mock")]
    pub voice_b: ProviderKind,

    /// Narration timeout in milliseconds (default: ARENA_NARRATIVE_TIMEOUT_MS or 8000)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Extra attempts per narrative line
    #[arg(long, default_value_t = 1)]
    pub retries: u32,
}

impl VoiceArgs {
    pub fn kinds(&self) -> [ProviderKind; 2] {
        [self.voice_a, self.voice_b]
    }

    /// Narrator for the session, or `None` when both agents are silent
    pub fn narrator(&self, llm: &LlmConfig) -> Result<Option<Arc<dyn Narrator>>> {
        let a = llm
            .build_provider(self.voice_a)
            .with_context(|| format!("Cannot voice the first agent with '{}'", self.voice_a))?;
        let b = llm
            .build_provider(self.voice_b)
            .with_context(|| format!("Cannot voice the second agent with '{}'", self.voice_b))?;

        if a.is_none() && b.is_none() {
            return Ok(None);
        }

        let config = NarratorConfig::default()
            .with_timeout_ms(self.timeout_ms.unwrap_or(llm.narrative_timeout_ms))
            .with_retries(self.retries);
        let narrator = LlmNarrator::new([a, b], config);
        tracing::info!(
            voice_a = narrator.voice_name(0).unwrap_or("silent"),
            voice_b = narrator.voice_name(1).unwrap_or("silent"),
            timeout_ms = narrator.config().timeout.as_millis() as u64,
            retries = narrator.config().retries,
            "Narration enabled"
        );
        Ok(Some(Arc::new(narrator)))
    }
}

/// Seeded when asked, OS entropy otherwise
pub fn random_source(seed: Option<u64>) -> Box<dyn RandomSource> {
    match seed {
        Some(seed) => Box::new(RngSource::seeded(seed)),
        None => Box::new(RngSource::from_os_rng()),
    }
}

/// Read and validate a JSON attack catalog
pub async fn load_catalog(path: &Path) -> Result<AttackCatalog> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;
    AttackCatalog::from_json(&json).with_context(|| format!("Invalid catalog {}", path.display()))
}
