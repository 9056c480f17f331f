//! Migration status command.

use anyhow::Result;
use colored::Colorize;
use hbe_core::migrations::MigrationStatus;

use super::{print_json, Target};

pub fn execute(target: &Target) -> Result<()> {
    let migrator = target.migrator()?;
    let db = target.open_existing()?;
    let status = db.with_connection(|conn| migrator.status(conn))?;

    if target.json {
        return print_json(&status);
    }
    print_status(&status);
    Ok(())
}

fn print_status(status: &MigrationStatus) {
    println!("{}", "Migration Status".cyan().bold());
    println!("{}", "─".repeat(60));

    for applied in &status.applied {
        let changed = status.drift.iter().any(|d| d.version == applied.version);
        let unknown = status.unknown.iter().any(|u| u.version == applied.version);
        let marker = if changed {
            "! changed".red()
        } else if unknown {
            "? unknown".yellow()
        } else {
            "✓ applied".green()
        };
        println!(
            "  {:<42} {:<12} {}",
            applied.id(),
            marker,
            applied.applied_at.dimmed()
        );
    }
    for pending in &status.pending {
        println!("  {:<42} {}", pending.id(), "○ pending".yellow());
    }

    println!();
    if status.is_up_to_date() {
        println!("{}", "Schema is up to date".green());
    } else {
        println!("{} pending migration(s)", status.pending.len().to_string().bold());
    }
    if !status.drift.is_empty() {
        println!(
            "{}",
            format!(
                "{} applied migration(s) changed since they ran (see `hbe verify`)",
                status.drift.len()
            )
            .red()
        );
    }
}
