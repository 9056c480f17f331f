//! hbe-core - Core library for the hotel booking engine schema
//!
//! This crate provides shared functionality between the `hbe` CLI and
//! `hbe-server`:
//!
//! - **migrations**: ordered SQL migrations, tracking table and runner
//! - **db**: SQLite connection handling
//! - **schema**: introspection of tables, columns and indexes
//! - **config**: environment-driven settings

pub mod config;
pub mod db;
pub mod error;
pub mod migrations;
pub mod schema;

// Re-export commonly used types
pub use config::Settings;
pub use db::Database;
pub use error::{Error, Result};
pub use migrations::{MigrationReport, Migrator};
