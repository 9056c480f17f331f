//! Error types for hbe-core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using hbe-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for database and migration operations
#[derive(Error, Debug)]
pub enum Error {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    // Migration source errors
    #[error("Migration directory not found: {}", .0.display())]
    MigrationDirNotFound(PathBuf),

    #[error("Invalid migration filename: {0} (expected NNN_description.sql)")]
    InvalidMigrationName(String),

    #[error("Duplicate migration version {version}: {first} and {second}")]
    DuplicateMigration {
        version: u32,
        first: String,
        second: String,
    },

    // Migration execution errors
    #[error("Migration {id} failed at statement {statement}: {source}")]
    MigrationFailed {
        id: String,
        statement: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Checksum mismatch for migration {id}: recorded {recorded}, found {actual}")]
    ChecksumMismatch {
        id: String,
        recorded: String,
        actual: String,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Identifier of the migration this error belongs to, if any
    pub fn migration_id(&self) -> Option<&str> {
        match self {
            Self::MigrationFailed { id, .. } | Self::ChecksumMismatch { id, .. } => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_failed_display() {
        let err = Error::MigrationFailed {
            id: "003_add_hotel_settings".to_string(),
            statement: 2,
            source: rusqlite::Error::InvalidQuery,
        };
        let msg = err.to_string();
        assert!(msg.contains("003_add_hotel_settings"));
        assert!(msg.contains("statement 2"));
        assert_eq!(err.migration_id(), Some("003_add_hotel_settings"));
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("API_PORT must be a number");
        assert!(err.to_string().starts_with("Configuration error"));
        assert!(err.migration_id().is_none());
    }
}
