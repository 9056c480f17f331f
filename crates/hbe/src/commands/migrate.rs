//! Apply pending migrations.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use super::{print_json, Target};

#[derive(Serialize)]
struct DryRun<'a> {
    pending: &'a [hbe_core::migrations::Migration],
}

pub fn execute(target: &Target, dry_run: bool) -> Result<()> {
    let migrator = target.migrator()?;
    let db = target.open()?;

    if dry_run {
        let pending = db.with_connection(|conn| migrator.pending(conn))?;
        if target.json {
            return print_json(&DryRun { pending: &pending });
        }

        if pending.is_empty() {
            println!("{}", "✓ Schema is up to date".green());
        } else {
            println!("{}", "Pending migrations:".cyan().bold());
            for migration in &pending {
                println!("  {} {}", "○".yellow(), migration.id());
            }
        }
        return Ok(());
    }

    let report = db
        .migrate(&migrator)
        .with_context(|| format!("Migrating {} failed", target.settings.database_path.display()))?;

    if target.json {
        return print_json(&report);
    }

    if report.is_noop() {
        println!(
            "{} ({} applied)",
            "✓ Schema is up to date".green(),
            report.already_applied
        );
        return Ok(());
    }

    for applied in &report.applied {
        println!(
            "  {} {} {}",
            "✓".green(),
            applied.id(),
            format!("({}ms)", applied.execution_ms).dimmed()
        );
    }
    println!();
    println!(
        "Applied {} migration(s) in {}ms",
        report.applied.len().to_string().bold(),
        report.duration_ms
    );
    Ok(())
}
