//! Migration runner
//!
//! Applies pending migrations in version order. Each migration runs in its own
//! transaction together with its tracking record; the first failure rolls that
//! migration back and stops the run.

use crate::error::{Error, Result};
use crate::migrations::source::{self, Migration};
use crate::migrations::statement::{parse_script, Statement};
use crate::migrations::tracker::{self, AppliedMigration};
use crate::schema;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// An ordered, validated set of migrations
#[derive(Debug, Clone)]
pub struct Migrator {
    migrations: Vec<Migration>,
}

/// Outcome of [`Migrator::run`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    /// Migrations applied by this run, in order
    pub applied: Vec<AppliedMigration>,
    /// Migrations that were already recorded
    pub already_applied: usize,
    pub duration_ms: u128,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// An applied migration whose source no longer matches the recorded checksum
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecksumDrift {
    pub version: u32,
    pub name: String,
    pub recorded: String,
    pub actual: String,
}

/// Read-only view of the database against the migration source
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationStatus {
    pub applied: Vec<AppliedMigration>,
    pub pending: Vec<Migration>,
    /// Recorded versions that have no migration in the source
    pub unknown: Vec<AppliedMigration>,
    pub drift: Vec<ChecksumDrift>,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Migrator {
    /// Sort and validate a set of migrations.
    ///
    /// Fails if two migrations share a version.
    pub fn new(mut migrations: Vec<Migration>) -> Result<Self> {
        migrations.sort_by_key(|m| m.version);
        for pair in migrations.windows(2) {
            if pair[0].version == pair[1].version {
                return Err(Error::DuplicateMigration {
                    version: pair[0].version,
                    first: pair[0].filename(),
                    second: pair[1].filename(),
                });
            }
        }
        Ok(Self { migrations })
    }

    /// The booking schema compiled into the binary
    pub fn embedded() -> Self {
        Self {
            migrations: source::embedded(),
        }
    }

    /// Load migrations from a directory of `NNN_description.sql` files
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(source::load_dir(dir.as_ref())?)
    }

    /// Migrations in application order
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Highest version known to this migrator
    pub fn latest_version(&self) -> Option<u32> {
        self.migrations.last().map(|m| m.version)
    }

    /// Apply every pending migration.
    pub fn run(&self, conn: &mut Connection) -> Result<MigrationReport> {
        let started = Instant::now();
        tracker::ensure_table(conn)?;

        let recorded: HashMap<u32, AppliedMigration> = tracker::applied(conn)?
            .into_iter()
            .map(|a| (a.version, a))
            .collect();
        let max_applied = recorded.keys().copied().max();

        let mut report = MigrationReport::default();
        for migration in &self.migrations {
            if let Some(existing) = recorded.get(&migration.version) {
                if existing.checksum != migration.checksum {
                    warn!(
                        migration = %migration.id(),
                        recorded = %existing.checksum,
                        actual = %migration.checksum,
                        "Applied migration has changed since it was recorded"
                    );
                }
                report.already_applied += 1;
                continue;
            }

            if max_applied.is_some_and(|max| migration.version < max) {
                warn!(
                    migration = %migration.id(),
                    "Applying migration older than the latest recorded version"
                );
            }

            match apply_one(conn, migration)? {
                Some(applied) => report.applied.push(applied),
                None => report.already_applied += 1,
            }
        }

        report.duration_ms = started.elapsed().as_millis();
        if report.is_noop() {
            info!("Schema is up to date ({} migrations)", report.already_applied);
        } else {
            info!(
                "Applied {} migration(s) in {}ms",
                report.applied.len(),
                report.duration_ms
            );
        }
        Ok(report)
    }

    /// Migrations that [`Migrator::run`] would apply
    pub fn pending(&self, conn: &Connection) -> Result<Vec<Migration>> {
        Ok(self.status(conn)?.pending)
    }

    /// Compare the database with this migrator without modifying anything.
    pub fn status(&self, conn: &Connection) -> Result<MigrationStatus> {
        let applied = if tracker::table_exists(conn)? {
            tracker::applied(conn)?
        } else {
            Vec::new()
        };

        let recorded: HashMap<u32, &AppliedMigration> =
            applied.iter().map(|a| (a.version, a)).collect();
        let known: HashMap<u32, &Migration> =
            self.migrations.iter().map(|m| (m.version, m)).collect();

        let pending = self
            .migrations
            .iter()
            .filter(|m| !recorded.contains_key(&m.version))
            .cloned()
            .collect();

        let unknown = applied
            .iter()
            .filter(|a| !known.contains_key(&a.version))
            .cloned()
            .collect();

        let drift = applied
            .iter()
            .filter_map(|a| {
                let m = known.get(&a.version)?;
                (m.checksum != a.checksum).then(|| ChecksumDrift {
                    version: a.version,
                    name: a.name.clone(),
                    recorded: a.checksum.clone(),
                    actual: m.checksum.clone(),
                })
            })
            .collect();

        Ok(MigrationStatus {
            applied,
            pending,
            unknown,
            drift,
        })
    }

    /// Fail on the first applied migration whose checksum has drifted.
    pub fn verify(&self, conn: &Connection) -> Result<()> {
        let status = self.status(conn)?;
        match status.drift.into_iter().next() {
            Some(d) => Err(Error::ChecksumMismatch {
                id: format!("{:03}_{}", d.version, d.name),
                recorded: d.recorded,
                actual: d.actual,
            }),
            None => Ok(()),
        }
    }
}

/// Apply one migration in an immediate transaction.
///
/// Returns `None` when another process recorded the migration between the
/// initial scan and acquiring the write lock.
fn apply_one(conn: &mut Connection, migration: &Migration) -> Result<Option<AppliedMigration>> {
    let id = migration.id();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if tracker::is_applied(&tx, migration.version)? {
        debug!(migration = %id, "Recorded by another process, skipping");
        return Ok(None);
    }

    info!(migration = %id, "Applying migration");
    let started = Instant::now();

    for (index, statement) in parse_script(&migration.sql).iter().enumerate() {
        execute_statement(&tx, statement).map_err(|err| match err {
            Error::Database(source) => Error::MigrationFailed {
                id: id.clone(),
                statement: index + 1,
                source,
            },
            other => other,
        })?;
    }

    let elapsed = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
    let applied = tracker::record(&tx, migration, elapsed)?;
    tx.commit()?;

    debug!(migration = %id, execution_ms = elapsed, "Migration committed");
    Ok(Some(applied))
}

fn execute_statement(tx: &Transaction<'_>, statement: &Statement) -> Result<()> {
    if let Statement::AddColumnIfMissing { table, column, .. } = statement {
        if schema::column_exists(tx, table, column)? {
            debug!(table = %table, column = %column, "Column exists, skipping");
            return Ok(());
        }
    }
    tx.execute_batch(statement.sql())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrator(files: &[(u32, &str, &str)]) -> Migrator {
        Migrator::new(
            files
                .iter()
                .map(|(v, name, sql)| Migration::new(*v, *name, *sql))
                .collect(),
        )
        .unwrap()
    }

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn test_new_sorts_by_version() {
        let m = migrator(&[(3, "c", "SELECT 3;"), (1, "a", "SELECT 1;"), (2, "b", "SELECT 2;")]);
        let versions: Vec<u32> = m.migrations().iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(m.latest_version(), Some(3));
    }

    #[test]
    fn test_new_rejects_duplicate_versions() {
        let err = Migrator::new(vec![
            Migration::new(2, "one", "SELECT 1;"),
            Migration::new(2, "two", "SELECT 2;"),
        ])
        .unwrap_err();
        match err {
            Error::DuplicateMigration { version, first, second } => {
                assert_eq!(version, 2);
                assert_eq!(first, "002_one.sql");
                assert_eq!(second, "002_two.sql");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_run_applies_in_order_and_records() {
        let mut conn = Connection::open_in_memory().unwrap();
        let m = migrator(&[
            (2, "add_b", "ALTER TABLE a ADD COLUMN b TEXT;"),
            (1, "create_a", "CREATE TABLE a (id INTEGER PRIMARY KEY);"),
        ]);

        let report = m.run(&mut conn).unwrap();
        let ids: Vec<String> = report.applied.iter().map(AppliedMigration::id).collect();
        assert_eq!(ids, vec!["001_create_a", "002_add_b"]);
        assert_eq!(report.already_applied, 0);
        assert!(schema::column_exists(&conn, "a", "b").unwrap());
    }

    #[test]
    fn test_second_run_is_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        let m = migrator(&[(1, "create_a", "CREATE TABLE a (id INTEGER);")]);

        m.run(&mut conn).unwrap();
        let report = m.run(&mut conn).unwrap();
        assert!(report.is_noop());
        assert_eq!(report.already_applied, 1);
    }

    #[test]
    fn test_tracking_table_is_source_of_truth() {
        // A recorded version is never re-run even if its SQL would now fail
        let mut conn = Connection::open_in_memory().unwrap();
        migrator(&[(1, "create_a", "CREATE TABLE a (id INTEGER);")])
            .run(&mut conn)
            .unwrap();

        let changed = migrator(&[(1, "create_a", "CREATE TABLE a (id INTEGER);\nTHIS IS NOT SQL;")]);
        let report = changed.run(&mut conn).unwrap();
        assert!(report.is_noop());
    }

    #[test]
    fn test_failure_rolls_back_and_stops() {
        let mut conn = Connection::open_in_memory().unwrap();
        let m = migrator(&[
            (1, "create_a", "CREATE TABLE a (id INTEGER);"),
            (2, "broken", "CREATE TABLE b (id INTEGER);\nINSERT INTO missing VALUES (1);"),
            (3, "create_c", "CREATE TABLE c (id INTEGER);"),
        ]);

        let err = m.run(&mut conn).unwrap_err();
        match &err {
            Error::MigrationFailed { id, statement, .. } => {
                assert_eq!(id, "002_broken");
                assert_eq!(*statement, 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        let tables = table_names(&conn);
        assert!(tables.contains(&"a".to_string()));
        assert!(!tables.contains(&"b".to_string()), "partial migration must roll back");
        assert!(!tables.contains(&"c".to_string()), "later migrations must not run");

        let versions: Vec<u32> = tracker::applied(&conn)
            .unwrap()
            .iter()
            .map(|a| a.version)
            .collect();
        assert_eq!(versions, vec![1]);
    }

    #[test]
    fn test_unterminated_quote_fails_migration() {
        let mut conn = Connection::open_in_memory().unwrap();
        let m = migrator(&[(1, "bad", "ALTER TABLE \"hôtelé")]);

        let err = m.run(&mut conn).unwrap_err();
        assert!(matches!(err, Error::MigrationFailed { ref id, statement: 1, .. } if id == "001_bad"));
        assert!(tracker::applied(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_retry_after_fix() {
        let mut conn = Connection::open_in_memory().unwrap();
        let broken = migrator(&[
            (1, "create_a", "CREATE TABLE a (id INTEGER);"),
            (2, "create_b", "CREATE TABLE b (id INTEGER);\nCREATE TABLE b (id INTEGER);"),
        ]);
        assert!(broken.run(&mut conn).is_err());

        let fixed = migrator(&[
            (1, "create_a", "CREATE TABLE a (id INTEGER);"),
            (2, "create_b", "CREATE TABLE IF NOT EXISTS b (id INTEGER);"),
        ]);
        let report = fixed.run(&mut conn).unwrap();
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].version, 2);
    }

    #[test]
    fn test_guarded_add_column_skips_existing() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE a (id INTEGER, b TEXT); INSERT INTO a VALUES (1, 'x');")
            .unwrap();

        let m = migrator(&[(
            1,
            "add_columns",
            "ALTER TABLE a ADD COLUMN IF NOT EXISTS b TEXT;\n\
             ALTER TABLE a ADD COLUMN IF NOT EXISTS c INTEGER NOT NULL DEFAULT 7;",
        )]);
        m.run(&mut conn).unwrap();

        assert!(schema::column_exists(&conn, "a", "c").unwrap());
        let (b, c): (String, i64) = conn
            .query_row("SELECT b, c FROM a WHERE id = 1", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!(b, "x");
        assert_eq!(c, 7);
    }

    #[test]
    fn test_out_of_order_migration_still_applied() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrator(&[(2, "create_b", "CREATE TABLE b (id INTEGER);")])
            .run(&mut conn)
            .unwrap();

        let report = migrator(&[
            (1, "create_a", "CREATE TABLE a (id INTEGER);"),
            (2, "create_b", "CREATE TABLE b (id INTEGER);"),
        ])
        .run(&mut conn)
        .unwrap();
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].version, 1);
    }

    #[test]
    fn test_status_without_tracking_table() {
        let conn = Connection::open_in_memory().unwrap();
        let status = Migrator::embedded().status(&conn).unwrap();
        assert!(status.applied.is_empty());
        assert_eq!(status.pending.len(), 8);
        assert!(!status.is_up_to_date());
        assert!(!tracker::table_exists(&conn).unwrap(), "status must not write");
    }

    #[test]
    fn test_status_reports_unknown_and_drift() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrator(&[
            (1, "create_a", "CREATE TABLE a (id INTEGER);"),
            (2, "create_b", "CREATE TABLE b (id INTEGER);"),
        ])
        .run(&mut conn)
        .unwrap();

        let current = migrator(&[
            (1, "create_a", "CREATE TABLE a (id INTEGER, extra TEXT);"),
            (3, "create_c", "CREATE TABLE c (id INTEGER);"),
        ]);
        let status = current.status(&conn).unwrap();

        assert_eq!(status.applied.len(), 2);
        assert_eq!(status.pending.iter().map(|m| m.version).collect::<Vec<_>>(), vec![3]);
        assert_eq!(status.unknown.iter().map(|a| a.version).collect::<Vec<_>>(), vec![2]);
        assert_eq!(status.drift.len(), 1);
        assert_eq!(status.drift[0].version, 1);

        let err = current.verify(&conn).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { ref id, .. } if id == "001_create_a"));
    }

    #[test]
    fn test_verify_clean() {
        let mut conn = Connection::open_in_memory().unwrap();
        let m = Migrator::embedded();
        m.run(&mut conn).unwrap();
        m.verify(&conn).unwrap();
        assert!(m.pending(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_appliers_on_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut conn = Connection::open(&path).unwrap();
                    conn.busy_timeout(std::time::Duration::from_secs(10)).unwrap();
                    Migrator::embedded().run(&mut conn).unwrap()
                })
            })
            .collect();

        let total_applied: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap().applied.len())
            .sum();
        assert_eq!(total_applied, 8, "each migration applied exactly once");

        let conn = Connection::open(&path).unwrap();
        assert_eq!(tracker::applied(&conn).unwrap().len(), 8);
    }
}
