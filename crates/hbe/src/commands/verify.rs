//! Checksum verification of applied migrations.

use anyhow::{Context, Result};
use colored::Colorize;

use super::{print_json, Target};

pub fn execute(target: &Target) -> Result<()> {
    let migrator = target.migrator()?;
    let db = target.open_existing()?;
    let status = db.with_connection(|conn| migrator.status(conn))?;

    if target.json {
        print_json(&status.drift)?;
    } else if status.drift.is_empty() {
        println!(
            "{} {} applied migration(s) match their source",
            "✓".green(),
            status.applied.len()
        );
    } else {
        for drift in &status.drift {
            println!(
                "  {} {:03}_{}: recorded {} now {}",
                "✗".red(),
                drift.version,
                drift.name,
                short(&drift.recorded),
                short(&drift.actual)
            );
        }
    }

    db.with_connection(|conn| migrator.verify(conn))
        .context("Applied migrations were modified; add a new migration instead")
}

fn short(checksum: &str) -> &str {
    checksum.get(..12).unwrap_or(checksum)
}
