//! Scaffold the next migration file.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use hbe_core::migrations::{source, Migration};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{print_json, Target};

pub fn execute(target: &Target, description: &str) -> Result<()> {
    let Some(dir) = &target.settings.migrations_dir else {
        bail!("`hbe new` needs a migrations directory (--migrations-dir or MIGRATIONS_DIR)");
    };

    let path = create_migration(dir, description)?;
    if target.json {
        return print_json(&serde_json::json!({ "path": path }));
    }
    println!("{} Created {}", "✓".green(), path.display());
    Ok(())
}

/// Write an empty migration numbered after the highest existing version
pub fn create_migration(dir: &Path, description: &str) -> Result<PathBuf> {
    let slug = slugify(description);
    if slug.is_empty() {
        bail!("Description '{description}' has no usable characters");
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let next = source::load_dir(dir)?
        .iter()
        .map(|m| m.version)
        .max()
        .unwrap_or(0)
        + 1;

    let migration = Migration::new(next, slug, template(description));
    let path = dir.join(migration.filename());
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(migration.sql.as_bytes())?;

    Ok(path)
}

/// Lowercase ASCII alphanumerics separated by single underscores
pub fn slugify(description: &str) -> String {
    let mut slug = String::with_capacity(description.len());
    for c in description.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

fn template(description: &str) -> String {
    format!(
        "-- {description}\n\
         --\n\
         -- Runs in a single transaction. Keep statements re-runnable:\n\
         -- CREATE TABLE IF NOT EXISTS, CREATE INDEX IF NOT EXISTS,\n\
         -- ALTER TABLE ... ADD COLUMN IF NOT EXISTS.\n\n"
    )
}
