//! Schema migrations
//!
//! Provides:
//! - Migration sources (directory or embedded catalogue) with checksums
//! - Statement splitting with `ADD COLUMN IF NOT EXISTS` support
//! - The append-only `schema_migrations` tracking table
//! - A transactional, fail-fast runner

mod checksum;
pub mod source;
pub mod statement;
pub mod tracker;
mod runner;

pub use checksum::compute_checksum;
pub use runner::{ChecksumDrift, MigrationReport, MigrationStatus, Migrator};
pub use source::Migration;
pub use tracker::{AppliedMigration, TRACKING_TABLE};
