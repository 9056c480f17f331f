//! hbe - Hotel booking engine schema CLI
//!
//! Operator tool for the booking schema migrations: apply them, check what a
//! database has recorded, detect edited migrations and scaffold new ones.

use anyhow::Result;
use clap::Parser;
use hbe_core::config::LogFormat;
use hbe_core::Settings;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Target;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let target = Target {
        settings: Settings {
            database_path: cli.database,
            migrations_dir: cli.migrations_dir,
            ..Settings::default()
        },
        json: cli.json,
    };

    match cli.command {
        Commands::Migrate { dry_run } => commands::migrate::execute(&target, dry_run),
        Commands::Status => commands::status::execute(&target),
        Commands::Verify => commands::verify::execute(&target),
        Commands::New { description } => commands::new::execute(&target, &description),
        Commands::Schema { table } => commands::schema::execute(&target, table.as_deref()),
        Commands::Version => {
            println!("hbe {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Logs go to stderr so `--json` output stays parseable
fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("hbe=info".parse()?);
    let format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|raw| raw.parse::<LogFormat>().ok())
        .unwrap_or_default();

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
    Ok(())
}
