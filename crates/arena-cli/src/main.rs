//! Arena CLI - run Prompt Arena battles from a terminal
//!
//! # Usage
//!
//! ```bash
//! # Play a full classic battle with offline mock voices
//! arena play
//!
//! # Psychological battle, Mistral voicing the second agent
//! arena play --ruleset psychological --voice-b mistral
//!
//! # Attackers taunt before each reaction
//! arena play --taunts
//!
//! # Drive a battle one turn at a time through a state file
//! arena turn --init --out battle.json
//! arena turn --state battle.json --out battle.json
//!
//! # List attacks
//! arena catalog --ruleset classic
//!
//! # Show version and provider configuration
//! arena info
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::{catalog, info, play, turn};

/// Prompt Arena
///
/// Two AI agents trade prompt-injection attacks until one is knocked out,
/// collapses, surrenders, or the round limit decides it.
#[derive(Parser)]
#[command(
    name = "arena",
    version,
    about = "Prompt Arena - turn-based battles between two AI agents",
    long_about = "Prompt Arena pits two AI agents against each other.\n\n\
                  Each turn one agent lands a scripted attack on the other;\n\
                  an optional language model voices the defender's reaction."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a battle to the end
    #[command(name = "play")]
    Play(play::PlayArgs),

    /// Advance a serialized battle by one turn
    #[command(name = "turn")]
    Turn(turn::TurnArgs),

    /// List attack catalogs
    #[command(name = "catalog")]
    Catalog(catalog::CatalogArgs),

    /// Show version and configuration
    #[command(name = "info")]
    Info(info::InfoArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Play(args) => play::run(args).await,
        Commands::Turn(args) => turn::run(args).await,
        Commands::Catalog(args) => catalog::run(args).await,
        Commands::Info(args) => info::run(args),
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries battle output and JSON state
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

/// Print a success message with a checkmark
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), msg);
}

/// Print an info message
pub fn print_info(msg: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), msg);
}
