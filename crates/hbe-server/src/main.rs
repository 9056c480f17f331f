//! hbe-server - Hotel booking engine backend
//!
//! Container entrypoint: brings the booking schema up to date, then serves
//! the HTTP API. A failed migration stops the process with a non-zero exit
//! code before any request is accepted.

use anyhow::Context;
use hbe_core::config::LogFormat;
use hbe_core::{Database, Settings};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env().context("Invalid configuration")?;
    init_tracing(settings.log_format);

    info!("hbe-server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Environment: {}, database: {}",
        settings.environment,
        settings.database_path.display()
    );

    let db = prepare(&settings)?;

    let bind_address = settings.bind_address();
    let app = routes::create_router(AppState::new(settings, db));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    Ok(())
}

/// Open the database and bring its schema up to date.
///
/// The server must not start when this fails.
fn prepare(settings: &Settings) -> anyhow::Result<Database> {
    let db = Database::open(&settings.database_path).with_context(|| {
        format!("Failed to open database {}", settings.database_path.display())
    })?;

    let migrator = settings.migrator()?;
    match db.migrate(&migrator) {
        Ok(report) if report.is_noop() => {
            info!("Schema up to date ({} migrations)", report.already_applied);
        }
        Ok(report) => {
            info!(
                "Applied {} migration(s) in {}ms",
                report.applied.len(),
                report.duration_ms
            );
        }
        Err(err) => {
            error!("Migration failed: {}", err);
            return Err(err).context("Database migration failed, refusing to start");
        }
    }
    Ok(db)
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hbe_server=info,hbe_core=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
