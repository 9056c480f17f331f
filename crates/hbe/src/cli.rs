//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand};
use hbe_core::config::DEFAULT_DATABASE_PATH;
use std::path::PathBuf;

/// Hotel booking engine schema tool
///
/// Applies, inspects and scaffolds the booking schema migrations.
#[derive(Parser, Debug)]
#[command(name = "hbe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "DATABASE_PATH", default_value = DEFAULT_DATABASE_PATH)]
    pub database: PathBuf,

    /// Directory of NNN_description.sql files (embedded migrations when unset)
    #[arg(long, global = true, env = "MIGRATIONS_DIR")]
    pub migrations_dir: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending migrations
    Migrate {
        /// List pending migrations without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show applied, pending and changed migrations
    Status,

    /// Fail if an applied migration was modified afterwards
    Verify,

    /// Create the next migration file
    New {
        /// Short description, e.g. "add hotel policies"
        description: String,
    },

    /// List tables, or describe one table
    Schema {
        /// Table to describe
        table: Option<String>,
    },

    /// Show version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate_dry_run() {
        let cli = Cli::try_parse_from([
            "hbe",
            "migrate",
            "--dry-run",
            "--database",
            "/tmp/test.db",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Migrate { dry_run: true }));
        assert_eq!(cli.database, PathBuf::from("/tmp/test.db"));
    }

    #[test]
    fn test_parse_global_flags_before_command() {
        let cli = Cli::try_parse_from([
            "hbe",
            "--json",
            "--migrations-dir",
            "./migrations",
            "schema",
            "booking_addons",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.migrations_dir, Some(PathBuf::from("./migrations")));
        match cli.command {
            Commands::Schema { table } => assert_eq!(table.as_deref(), Some("booking_addons")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_new_requires_description() {
        assert!(Cli::try_parse_from(["hbe", "new"]).is_err());
    }
}
