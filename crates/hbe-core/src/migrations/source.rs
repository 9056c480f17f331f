//! Migration sources.
//!
//! A migration is a versioned SQL script named `NNN_description.sql`. Sources
//! are either a directory on disk or the catalogue compiled into the binary.

use crate::error::{Error, Result};
use crate::migrations::checksum::compute_checksum;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Minimum number of digits in a migration version prefix
const MIN_VERSION_DIGITS: usize = 3;

/// A single versioned migration script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Migration {
    pub version: u32,
    pub name: String,
    #[serde(skip)]
    pub sql: String,
    pub checksum: String,
}

impl Migration {
    /// Create a migration, computing the checksum of its SQL
    pub fn new(version: u32, name: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        Self {
            version,
            name: name.into(),
            checksum: compute_checksum(&sql),
            sql,
        }
    }

    /// Build a migration from its filename and contents
    pub fn from_filename(filename: &str, sql: impl Into<String>) -> Result<Self> {
        let (version, name) = parse_filename(filename)?;
        Ok(Self::new(version, name, sql))
    }

    /// Identifier used in logs and errors, e.g. `008_allow_multiple_hotels_per_user`
    pub fn id(&self) -> String {
        format!("{:03}_{}", self.version, self.name)
    }

    /// Canonical filename for this migration
    pub fn filename(&self) -> String {
        format!("{}.sql", self.id())
    }
}

/// Split a migration filename into its version and description.
pub fn parse_filename(filename: &str) -> Result<(u32, String)> {
    let invalid = || Error::InvalidMigrationName(filename.to_string());

    let stem = filename.strip_suffix(".sql").ok_or_else(invalid)?;
    let (prefix, name) = stem.split_once('_').ok_or_else(invalid)?;

    if prefix.len() < MIN_VERSION_DIGITS || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if name.is_empty() {
        return Err(invalid());
    }

    let version: u32 = prefix.parse().map_err(|_| invalid())?;
    if version == 0 {
        return Err(invalid());
    }

    Ok((version, name.to_string()))
}

/// Load every `.sql` file in `dir` as a migration.
///
/// Files with other extensions are ignored. The result is unsorted; ordering
/// and duplicate detection happen in [`crate::migrations::Migrator::new`].
pub fn load_dir(dir: &Path) -> Result<Vec<Migration>> {
    if !dir.is_dir() {
        return Err(Error::MigrationDirNotFound(dir.to_path_buf()));
    }

    let mut migrations = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().into_owned();
        let sql = std::fs::read_to_string(&path)?;
        let migration = Migration::from_filename(&filename, sql)?;
        debug!(migration = %migration.id(), "Loaded migration from {}", path.display());
        migrations.push(migration);
    }

    Ok(migrations)
}

/// The booking schema migrations, embedded at compile time
pub fn embedded() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "create_booking_hotels",
            include_str!("../../../../migrations/001_create_booking_hotels.sql"),
        ),
        Migration::new(
            2,
            "add_hotel_owner",
            include_str!("../../../../migrations/002_add_hotel_owner.sql"),
        ),
        Migration::new(
            3,
            "add_hotel_settings",
            include_str!("../../../../migrations/003_add_hotel_settings.sql"),
        ),
        Migration::new(
            4,
            "add_hotel_design",
            include_str!("../../../../migrations/004_add_hotel_design.sql"),
        ),
        Migration::new(
            5,
            "create_booking_hotel_translations",
            include_str!("../../../../migrations/005_create_booking_hotel_translations.sql"),
        ),
        Migration::new(
            6,
            "create_booking_addons",
            include_str!("../../../../migrations/006_create_booking_addons.sql"),
        ),
        Migration::new(
            7,
            "add_addon_display",
            include_str!("../../../../migrations/007_add_addon_display.sql"),
        ),
        Migration::new(
            8,
            "allow_multiple_hotels_per_user",
            include_str!("../../../../migrations/008_allow_multiple_hotels_per_user.sql"),
        ),
    ]
}
