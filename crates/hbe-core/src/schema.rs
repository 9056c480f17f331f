//! Schema introspection.
//!
//! Reads SQLite's catalogue to answer questions about the live schema: which
//! tables, columns and indexes exist. Used by the migration runner for guarded
//! column adds, by the CLI `schema` command, and by tests comparing schemas.

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

/// Hotel profiles
pub const HOTELS: &str = "booking_hotels";
/// Per-locale hotel overrides
pub const HOTEL_TRANSLATIONS: &str = "booking_hotel_translations";
/// Purchasable extras
pub const ADDONS: &str = "booking_addons";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

/// A table, index, trigger or view from `sqlite_master`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaObject {
    pub kind: String,
    pub name: String,
    pub table: String,
    pub sql: Option<String>,
}

/// Check whether a table exists
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(found)
}

/// User tables, sorted by name
pub fn tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

/// Columns of a table in declaration order. Empty if the table doesn't exist.
pub fn columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk
         FROM pragma_table_info(?1)
         ORDER BY cid",
    )?;
    let cols = stmt
        .query_map(params![table], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                decl_type: row.get(1)?,
                not_null: row.get(2)?,
                default_value: row.get(3)?,
                primary_key: row.get::<_, i64>(4)? > 0,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(cols)
}

/// Look up a single column
pub fn column(conn: &Connection, table: &str, column: &str) -> Result<Option<ColumnInfo>> {
    Ok(columns(conn, table)?
        .into_iter()
        .find(|c| c.name.eq_ignore_ascii_case(column)))
}

/// Check whether `table` has a column named `column` (case-insensitive)
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2 COLLATE NOCASE",
            params![table, column],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(found)
}

/// Indexes on a table, including those backing UNIQUE constraints, sorted by name
pub fn indexes(conn: &Connection, table: &str) -> Result<Vec<IndexInfo>> {
    let mut list = conn.prepare(
        "SELECT name, \"unique\" FROM pragma_index_list(?1) ORDER BY name",
    )?;
    let entries = list
        .query_map(params![table], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut info = conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
    let mut indexes = Vec::with_capacity(entries.len());
    for (name, unique) in entries {
        let columns = info
            .query_map(params![name], |row| row.get::<_, Option<String>>(0))?
            .filter_map(|c| c.transpose())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        indexes.push(IndexInfo {
            name,
            unique,
            columns,
        });
    }
    Ok(indexes)
}

/// Every user-defined schema object, sorted by kind then name.
///
/// Two databases with equal snapshots have identical schemas.
pub fn snapshot(conn: &Connection) -> Result<Vec<SchemaObject>> {
    let mut stmt = conn.prepare(
        "SELECT type, name, tbl_name, sql FROM sqlite_master
         WHERE name NOT LIKE 'sqlite_%'
         ORDER BY type, name",
    )?;
    let objects = stmt
        .query_map([], |row| {
            Ok(SchemaObject {
                kind: row.get(0)?,
                name: row.get(1)?,
                table: row.get(2)?,
                sql: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(objects)
}
