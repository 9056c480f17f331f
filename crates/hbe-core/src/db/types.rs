//! Database types for hbe-core.

use serde::{Deserialize, Serialize};

/// Connectivity summary reported by the `/health/db` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub connected: bool,
    /// SQLite library version, e.g. `3.46.0`
    pub version: String,
    /// Number of user tables
    pub tables: usize,
    pub migrations_applied: usize,
    /// Latest applied migration version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
}
