//! Play command - run a battle from start to finish
//!
//! Usage:
//! ```bash
//! arena play
//! arena play --ruleset psychological --rounds 6 --seed 42
//! arena play --voice-a openai --voice-b mistral --json
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::{ColoredString, Colorize};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use arena_core::{BattleState, Ruleset};
use arena_llm::LlmConfig;
use arena_runtime::BattleSession;

use super::{random_source, BattleArgs, VoiceArgs};
use crate::print_warning;

/// Arguments for the play command
#[derive(Args)]
pub struct PlayArgs {
    #[command(flatten)]
    battle: BattleArgs,

    #[command(flatten)]
    voices: VoiceArgs,

    /// Seed for a reproducible battle
    #[arg(long, env = "ARENA_SEED")]
    seed: Option<u64>,

    /// Print the final state as JSON instead of the live log
    #[arg(long)]
    json: bool,
}

/// Run the play command
pub async fn run(args: PlayArgs) -> Result<()> {
    let llm = LlmConfig::from_env();
    let config = args.battle.config(args.voices.kinds(), &llm).await?;

    let mut session = BattleSession::with_rng(config, random_source(args.seed))
        .context("Failed to open battle session")?;
    match args.voices.narrator(&llm)? {
        Some(narrator) => session = session.with_narrator(narrator),
        None => print_warning("Both agents are silent; no narration this battle"),
    }

    let mut state = session.start().await?;
    tracing::info!(
        battle = %state.id,
        ruleset = %state.config.ruleset(),
        max_rounds = state.config.max_rounds,
        "Battle started"
    );
    let mut printed = 0;
    if !args.json {
        print_new_lines(&state, &mut printed);
    }

    while state.is_active {
        session.advance_turn().await.context("Turn failed")?;
        state = session.current_state().await;
        if !args.json {
            print_new_lines(&state, &mut printed);
        }
    }

    tracing::info!(
        battle = %state.id,
        turns = state.turn,
        outcome = ?state.winner,
        reason = ?state.reason,
        "Battle finished"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!();
        print_standings(&state);
    }

    Ok(())
}

fn print_new_lines(state: &BattleState, printed: &mut usize) {
    for line in state.battle_log.iter().skip(*printed) {
        println!("{}", paint(line));
    }
    *printed = state.battle_log.len();
}

/// Color a log line by its marker
fn paint(line: &str) -> ColoredString {
    if line.starts_with("🏆") || line.starts_with("🔥") {
        line.bold().green()
    } else if line.starts_with("🤝") || line.starts_with("⚖️") {
        line.bold().yellow()
    } else if line.starts_with("💀") || line.starts_with("🧠") {
        line.bold().red()
    } else if line.starts_with("⚠") {
        line.yellow()
    } else if line.starts_with("🔍") {
        line.cyan()
    } else if line.starts_with("---") {
        line.dimmed()
    } else if line.starts_with("Turn ") {
        line.bold()
    } else {
        line.normal()
    }
}

fn print_standings(state: &BattleState) {
    let ruleset = state.config.ruleset();

    let mut header = vec![Cell::new("Agent").fg(Color::Cyan), Cell::new("Model").fg(Color::Cyan)];
    match ruleset {
        Ruleset::Classic => header.push(Cell::new("Health").fg(Color::Cyan)),
        Ruleset::Psychological => {
            header.push(Cell::new("Trust").fg(Color::Cyan));
            header.push(Cell::new("Memory").fg(Color::Cyan));
            header.push(Cell::new("Belief").fg(Color::Cyan));
        }
    }
    header.push(Cell::new("Status").fg(Color::Cyan));
    header.push(Cell::new("Result").fg(Color::Cyan));

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header);

    let winner = state.winner.as_ref().and_then(|o| o.winner_index());
    for (index, agent) in state.agents.iter().enumerate() {
        let mut row = vec![Cell::new(&agent.name).fg(Color::Green), Cell::new(&agent.model)];
        match ruleset {
            Ruleset::Classic => row.push(Cell::new(agent.health.value)),
            Ruleset::Psychological => {
                for meter in agent.mental.meters() {
                    row.push(Cell::new(meter.value));
                }
            }
        }
        row.push(Cell::new(agent.status));
        row.push(match winner {
            Some(w) if w == index => Cell::new("WINNER").fg(Color::Green),
            Some(_) => Cell::new("defeated").fg(Color::Red),
            None => Cell::new("-").fg(Color::Yellow),
        });
        table.add_row(row);
    }

    println!("{table}");

    let verdict = match (&state.winner, state.reason) {
        (Some(outcome), Some(reason)) => format!("{} by {}", outcome, reason),
        _ => "unfinished".to_string(),
    };
    println!(
        "{} {}  {} {}  {} {}",
        "Result:".dimmed(),
        verdict.bold(),
        "Turns:".dimmed(),
        state.turn,
        "Battle:".dimmed(),
        state.id
    );
}
