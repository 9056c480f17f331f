//! Application state.

use hbe_core::{Database, Settings};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
pub struct AppState {
    /// Runtime settings
    pub settings: Settings,
    /// Database connection (already migrated)
    pub db: Database,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(settings: Settings, db: Database) -> Arc<Self> {
        Arc::new(Self {
            settings,
            db,
            start_time: Instant::now(),
        })
    }
}
