//! Command implementations.

pub mod migrate;
pub mod new;
pub mod schema;
pub mod status;
pub mod verify;

use anyhow::{bail, Context, Result};
use hbe_core::{Database, Migrator, Settings};
use serde::Serialize;

/// Database and migration source selected by the global flags
#[derive(Debug, Clone)]
pub struct Target {
    pub settings: Settings,
    pub json: bool,
}

impl Target {
    pub fn migrator(&self) -> Result<Migrator> {
        self.settings.migrator().context("Failed to load migrations")
    }

    /// Open the database, creating the file if needed
    pub fn open(&self) -> Result<Database> {
        let path = &self.settings.database_path;
        Database::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))
    }

    /// Open an existing database for inspection only
    pub fn open_existing(&self) -> Result<Database> {
        let path = &self.settings.database_path;
        if !path.exists() {
            bail!(
                "Database {} does not exist (run `hbe migrate` to create it)",
                path.display()
            );
        }
        Database::open_read_only(path)
            .with_context(|| format!("Failed to open database {}", path.display()))
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
