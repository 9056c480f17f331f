//! SQLite database access.
//!
//! The booking schema lives in a single SQLite file. Connections are opened
//! with foreign keys enforced (cascading deletes depend on it) and, for file
//! databases, WAL journaling plus a busy timeout so several processes can
//! share the file.

pub mod types;

pub use types::*;

use crate::error::{Error, Result};
use crate::migrations::{tracker, MigrationReport, Migrator};
use crate::schema;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// How long a connection waits on a locked database before failing
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Database connection wrapper.
///
/// Thread-safe via internal Mutex. All database operations acquire the lock.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (creating if needed) the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = open_connection(path.as_ref())?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an existing database file without write access.
    ///
    /// Journal mode is left as is so inspecting a database never modifies it.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        debug!("Opened database at {} (read-only)", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn, false)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` with exclusive access to the underlying connection
    pub fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        f(&mut conn)
    }

    /// Apply pending migrations
    pub fn migrate(&self, migrator: &Migrator) -> Result<MigrationReport> {
        self.with_connection(|conn| migrator.run(conn))
    }

    /// Check database connectivity
    pub fn ping(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch("SELECT 1")?;
            Ok(())
        })
    }

    /// Collect connectivity and schema information
    pub fn info(&self) -> Result<DatabaseInfo> {
        self.with_connection(|conn| {
            let version: String = conn.query_row("SELECT sqlite_version()", [], |r| r.get(0))?;
            let tables = schema::tables(conn)?.len();

            let applied = if tracker::table_exists(conn)? {
                tracker::applied(conn)?
            } else {
                Vec::new()
            };

            Ok(DatabaseInfo {
                connected: true,
                version,
                tables,
                migrations_applied: applied.len(),
                schema_version: applied.last().map(|a| a.version),
            })
        })
    }
}

/// Open and configure a connection to a database file.
///
/// Parent directories are created so a fresh container volume works.
pub fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    configure(&conn, true)?;
    debug!("Opened database at {}", path.display());
    Ok(conn)
}

/// Apply connection settings
pub fn configure(conn: &Connection, file_backed: bool) -> Result<()> {
    // Required for ON DELETE CASCADE
    conn.pragma_update(None, "foreign_keys", true)?;

    if file_backed {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // journal_mode returns the resulting mode as a row
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    }
    Ok(())
}
