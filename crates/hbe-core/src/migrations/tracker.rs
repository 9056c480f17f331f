//! Migration tracking table.
//!
//! `schema_migrations` records every applied migration. It is append-only:
//! triggers reject updates and deletes so history cannot be rewritten.

use crate::error::Result;
use crate::migrations::source::Migration;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

/// Name of the tracking table
pub const TRACKING_TABLE: &str = "schema_migrations";

const CREATE_TRACKING_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        checksum TEXT NOT NULL,
        applied_at TEXT NOT NULL,
        execution_ms INTEGER NOT NULL DEFAULT 0
    );

    CREATE TRIGGER IF NOT EXISTS schema_migrations_no_update
    BEFORE UPDATE ON schema_migrations
    BEGIN
        SELECT RAISE(ABORT, 'schema_migrations is append-only');
    END;

    CREATE TRIGGER IF NOT EXISTS schema_migrations_no_delete
    BEFORE DELETE ON schema_migrations
    BEGIN
        SELECT RAISE(ABORT, 'schema_migrations is append-only');
    END;
";

/// A row of the tracking table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub version: u32,
    pub name: String,
    pub checksum: String,
    pub applied_at: String,
    pub execution_ms: i64,
}

impl AppliedMigration {
    /// Identifier in the same `NNN_name` form as [`Migration::id`]
    pub fn id(&self) -> String {
        format!("{:03}_{}", self.version, self.name)
    }
}

/// Create the tracking table and its guards if they don't exist
pub fn ensure_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TRACKING_TABLE_SQL)?;
    Ok(())
}

/// Check whether the tracking table has been created
pub fn table_exists(conn: &Connection) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![TRACKING_TABLE],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(exists)
}

/// All recorded migrations, ordered by version
pub fn applied(conn: &Connection) -> Result<Vec<AppliedMigration>> {
    let mut stmt = conn.prepare(
        "SELECT version, name, checksum, applied_at, execution_ms
         FROM schema_migrations
         ORDER BY version",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AppliedMigration {
                version: row.get(0)?,
                name: row.get(1)?,
                checksum: row.get(2)?,
                applied_at: row.get(3)?,
                execution_ms: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Check whether a version has been recorded
pub fn is_applied(conn: &Connection, version: u32) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM schema_migrations WHERE version = ?1",
            params![version],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(found)
}

/// Record a migration as applied.
///
/// Callers run this inside the transaction that executed the migration so
/// the record and the schema change commit together.
pub fn record(
    conn: &Connection,
    migration: &Migration,
    execution_ms: i64,
) -> Result<AppliedMigration> {
    let applied = AppliedMigration {
        version: migration.version,
        name: migration.name.clone(),
        checksum: migration.checksum.clone(),
        applied_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        execution_ms,
    };

    conn.execute(
        "INSERT INTO schema_migrations (version, name, checksum, applied_at, execution_ms)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            applied.version,
            applied.name,
            applied.checksum,
            applied.applied_at,
            applied.execution_ms,
        ],
    )?;

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ensure_table(&conn).unwrap();
        conn
    }

    #[test]
    fn test_ensure_table_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!table_exists(&conn).unwrap());
        ensure_table(&conn).unwrap();
        ensure_table(&conn).unwrap();
        assert!(table_exists(&conn).unwrap());
    }

    #[test]
    fn test_record_and_list() {
        let conn = setup();
        let second = Migration::new(2, "second", "SELECT 2;");
        let first = Migration::new(1, "first", "SELECT 1;");

        record(&conn, &second, 3).unwrap();
        let recorded = record(&conn, &first, 5).unwrap();
        assert_eq!(recorded.id(), "001_first");
        assert_eq!(recorded.checksum, first.checksum);

        let rows = applied(&conn).unwrap();
        let versions: Vec<u32> = rows.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(rows[1].execution_ms, 3);

        assert!(is_applied(&conn, 1).unwrap());
        assert!(!is_applied(&conn, 3).unwrap());
    }

    #[test]
    fn test_duplicate_record_rejected() {
        let conn = setup();
        let m = Migration::new(1, "first", "SELECT 1;");
        record(&conn, &m, 0).unwrap();
        assert!(record(&conn, &m, 0).is_err());
    }

    #[test]
    fn test_tracking_table_is_append_only() {
        let conn = setup();
        record(&conn, &Migration::new(1, "first", "SELECT 1;"), 0).unwrap();

        let update = conn.execute("UPDATE schema_migrations SET name = 'renamed'", []);
        assert!(update.unwrap_err().to_string().contains("append-only"));

        let delete = conn.execute("DELETE FROM schema_migrations", []);
        assert!(delete.unwrap_err().to_string().contains("append-only"));

        assert_eq!(applied(&conn).unwrap().len(), 1);
    }
}
