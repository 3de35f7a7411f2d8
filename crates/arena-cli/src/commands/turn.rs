//! Turn command - advance a serialized battle by one turn
//!
//! The state file is the whole battle as JSON, so a caller can drive a
//! battle turn by turn without holding a session open.
//!
//! Usage:
//! ```bash
//! arena turn --init --ruleset psychological --out battle.json
//! arena turn --state battle.json --out battle.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use arena_core::{BattleState, TurnReport};
use arena_llm::LlmConfig;
use arena_runtime::BattleSession;

use super::{random_source, BattleArgs, VoiceArgs};
use crate::{print_info, print_success};

/// Arguments for the turn command
#[derive(Args)]
pub struct TurnArgs {
    /// Battle state to advance (JSON)
    #[arg(long, value_name = "FILE", required_unless_present = "init", conflicts_with = "init")]
    state: Option<PathBuf>,

    /// Write the resulting state here instead of stdout
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Emit a freshly started battle instead of advancing one
    #[arg(long)]
    init: bool,

    #[command(flatten)]
    battle: BattleArgs,

    #[command(flatten)]
    voices: VoiceArgs,

    /// Seed for this turn's rolls
    #[arg(long, env = "ARENA_SEED")]
    seed: Option<u64>,
}

/// Run the turn command
pub async fn run(args: TurnArgs) -> Result<()> {
    let llm = LlmConfig::from_env();

    let path = match (&args.state, args.init) {
        (_, true) => {
            let config = args.battle.config(args.voices.kinds(), &llm).await?;
            let state = BattleState::started(config)?;
            print_info(&format!("Started battle {}", state.id));
            return write_state(&state, args.out.as_deref()).await;
        }
        (Some(path), false) => path,
        (None, false) => anyhow::bail!("--state or --init is required"),
    };

    let state = read_state(path).await?;
    let mut session = BattleSession::from_state(state, random_source(args.seed))
        .with_context(|| format!("Refusing state in {}", path.display()))?;
    if let Some(narrator) = args.voices.narrator(&llm)? {
        session = session.with_narrator(narrator);
    }

    let report = session.advance_turn().await.context("Turn rejected")?;
    tracing::info!(
        battle = %session.id(),
        turn = report.turn,
        attack = %report.attack_id,
        damage = report.damage,
        "Turn played"
    );
    if let (Some(outcome), Some(reason)) = (&report.outcome, report.reason) {
        tracing::info!(battle = %session.id(), %outcome, %reason, "Battle finished");
    }
    let state = session.current_state().await;
    summarize(&state, &report);

    write_state(&state, args.out.as_deref()).await
}

async fn read_state(path: &Path) -> Result<BattleState> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read state {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid battle state in {}", path.display()))
}

async fn write_state(state: &BattleState, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    match out {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write state {}", path.display()))?;
            print_success(&format!("State written to {}", path.display()));
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// One-line account of the turn on stderr; stdout may carry the state
fn summarize(state: &BattleState, report: &TurnReport) {
    let attacker = &state.agents[report.attacker].name;
    let defender = &state.agents[report.defender].name;
    eprintln!(
        "{} {} {} {} with {} for {}",
        format!("Turn {}:", report.turn).bold(),
        attacker.green(),
        "→".dimmed(),
        defender.red(),
        report.attack_id.cyan(),
        report.damage
    );
    if let Some(taunt) = &report.taunt {
        eprintln!("  {} \"{}\"", format!("{}:", attacker).dimmed(), taunt.text());
    }
    if let Some(narrative) = &report.narrative {
        eprintln!("  {} \"{}\"", format!("{}:", defender).dimmed(), narrative.text());
    }
    if let (Some(outcome), Some(reason)) = (&report.outcome, report.reason) {
        eprintln!("  {} {} by {}", "🏆".bold(), outcome.to_string().bold(), reason);
    }
}
