//! Info command - show version and provider configuration
//!
//! Usage:
//! ```bash
//! arena info
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use arena_core::{BattleConfig, Ruleset, SURRENDER_PHRASES};
use arena_llm::{LlmConfig, ProviderKind};

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs;

/// Run the info command
pub fn run(_args: InfoArgs) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let llm = LlmConfig::from_env();

    println!("{}", "Prompt Arena".bold().cyan());
    println!("{}", "═".repeat(50).cyan());
    println!();

    println!("{}", "Version Information:".bold());
    println!("  {} {}", "CLI Version:".dimmed(), version.green());
    println!();

    println!("{}", "Rulesets:".bold());
    for ruleset in [Ruleset::Classic, Ruleset::Psychological] {
        let config = BattleConfig::for_ruleset(ruleset);
        let stalemate = match config.stalemate {
            Some(rule) => format!(
                ", stalemate {:.0}% per round from round {}",
                rule.chance * 100.0,
                rule.after_round
            ),
            None => String::new(),
        };
        println!(
            "  {} {} {}",
            "•".cyan(),
            ruleset.as_str().green(),
            format!(
                "({} attacks, {} rounds{})",
                config.catalog.len(),
                config.max_rounds,
                stalemate
            )
            .dimmed()
        );
    }
    println!();

    println!("{}", "Narrative Providers:".bold());
    for kind in ProviderKind::ALL {
        let mark = if llm.is_configured(kind) { "✓".green() } else { "✗".red() };
        let detail = match kind.key_var() {
            Some(var) => format!("{} via {}", llm.model_for(kind), var),
            None if kind == ProviderKind::None => "silent agents".to_string(),
            None => "offline, no key needed".to_string(),
        };
        println!("  {} {} {}", mark, kind.as_str().green(), detail.dimmed());
    }
    println!(
        "  {} {}ms",
        "Narrative timeout:".dimmed(),
        llm.narrative_timeout_ms
    );
    println!();

    println!("{}", "Surrender phrases:".bold());
    println!("  {}", SURRENDER_PHRASES.join(", ").dimmed());
    println!();

    println!("{}", "Configuration:".bold());
    println!(
        "  {} Set OPENAI_API_KEY / MISTRAL_API_KEY, then pick voices with --voice-a / --voice-b",
        "ℹ".blue()
    );
    println!();

    Ok(())
}
