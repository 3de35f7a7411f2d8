//! Catalog command - list the attacks a battle draws from
//!
//! Usage:
//! ```bash
//! arena catalog
//! arena catalog --ruleset psychological
//! arena catalog --file my_attacks.json --json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use arena_core::{AttackCatalog, AttackSpec, Damage, Ruleset};

use super::load_catalog;

/// Arguments for the catalog command
#[derive(Args)]
pub struct CatalogArgs {
    /// Only show this ruleset's built-in catalog
    #[arg(long)]
    ruleset: Option<Ruleset>,

    /// Validate and show a JSON catalog file instead
    #[arg(long, value_name = "FILE", conflicts_with = "ruleset")]
    file: Option<PathBuf>,

    /// Output raw JSON
    #[arg(long)]
    json: bool,
}

/// Run the catalog command
pub async fn run(args: CatalogArgs) -> Result<()> {
    let catalogs = match (&args.file, args.ruleset) {
        (Some(path), _) => vec![load_catalog(path).await?],
        (None, Some(ruleset)) => vec![AttackCatalog::for_ruleset(ruleset)],
        (None, None) => vec![AttackCatalog::classic(), AttackCatalog::psychological()],
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalogs)?);
        return Ok(());
    }

    for catalog in &catalogs {
        print_catalog(catalog);
    }
    Ok(())
}

fn print_catalog(catalog: &AttackCatalog) {
    println!(
        "{}",
        format!("⚔ {} catalog ({} attacks)", catalog.ruleset, catalog.len()).bold().cyan()
    );
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Effect").fg(Color::Cyan),
            Cell::new("Damage").fg(Color::Cyan),
            Cell::new("Detection").fg(Color::Cyan),
            Cell::new("Payloads").fg(Color::Cyan),
        ]);

    for attack in &catalog.attacks {
        table.add_row(vec![
            Cell::new(&attack.id).fg(Color::Green),
            Cell::new(&attack.name),
            Cell::new(format!("{:?}", attack.effect)),
            Cell::new(damage_label(&attack.damage)).fg(Color::Red),
            Cell::new(detection_label(attack)).fg(Color::Yellow),
            Cell::new(attack.payloads.len()),
        ]);
    }

    println!("{table}");
    println!();
}

fn damage_label(damage: &Damage) -> String {
    match *damage {
        Damage::Health { min, width: 0 | 1 } => format!("{min}"),
        Damage::Health { min, width } => format!("{}-{}", min, min + width - 1),
        Damage::Mental { trust, memory, belief } => {
            format!("trust {trust} / memory {memory} / belief {belief}")
        }
    }
}

fn detection_label(attack: &AttackSpec) -> String {
    match attack.detection {
        Some(d) => format!("{:.0}% (refund {:.0}%)", d.chance * 100.0, d.refund * 100.0),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damage_labels() {
        assert_eq!(damage_label(&Damage::Health { min: 15, width: 10 }), "15-24");
        assert_eq!(damage_label(&Damage::Health { min: 50, width: 0 }), "50");
        assert_eq!(
            damage_label(&Damage::Mental { trust: 25, memory: 15, belief: 10 }),
            "trust 25 / memory 15 / belief 10"
        );
    }

    #[test]
    fn test_detection_label() {
        let catalog = AttackCatalog::psychological();
        assert_eq!(detection_label(&catalog.attacks[1]), "40% (refund 30%)");
        assert_eq!(detection_label(&AttackCatalog::classic().attacks[0]), "-");
    }
}
