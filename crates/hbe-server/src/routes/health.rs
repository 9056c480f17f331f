//! Root and health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use hbe_core::db::DatabaseInfo;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::state::AppState;

pub const SERVICE_NAME: &str = "hotel-booking-engine";

#[derive(Serialize)]
pub struct Welcome {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    pub status: String,
    pub database: DatabaseStatus,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum DatabaseStatus {
    Connected(DatabaseInfo),
    Disconnected { connected: bool, error: String },
}

/// Placeholder root endpoint
pub async fn root() -> Json<Welcome> {
    Json(Welcome {
        message: "Welcome to the Hotel Booking Engine API".to_string(),
    })
}

/// Liveness check
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// Database connectivity check. Responds 503 when the database is unreachable.
pub async fn database_health(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<DatabaseHealth>) {
    match state.db.info() {
        Ok(info) => (
            StatusCode::OK,
            Json(DatabaseHealth {
                status: "healthy".to_string(),
                database: DatabaseStatus::Connected(info),
            }),
        ),
        Err(err) => {
            warn!("Database health check failed: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(DatabaseHealth {
                    status: "unhealthy".to_string(),
                    database: DatabaseStatus::Disconnected {
                        connected: false,
                        error: err.to_string(),
                    },
                }),
            )
        }
    }
}
