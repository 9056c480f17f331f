//! Live schema inspection.

use anyhow::{bail, Result};
use colored::Colorize;
use hbe_core::schema::{self, ColumnInfo, IndexInfo};
use serde::Serialize;

use super::{print_json, Target};

#[derive(Serialize)]
struct TableDescription {
    table: String,
    columns: Vec<ColumnInfo>,
    indexes: Vec<IndexInfo>,
}

pub fn execute(target: &Target, table: Option<&str>) -> Result<()> {
    let db = target.open_existing()?;

    let Some(table) = table else {
        let tables = db.with_connection(|conn| schema::tables(conn))?;
        if target.json {
            return print_json(&tables);
        }
        for name in &tables {
            println!("  {name}");
        }
        return Ok(());
    };

    let description = db.with_connection(|conn| {
        if !schema::table_exists(conn, table)? {
            return Ok(None);
        }
        Ok(Some(TableDescription {
            table: table.to_string(),
            columns: schema::columns(conn, table)?,
            indexes: schema::indexes(conn, table)?,
        }))
    })?;
    let Some(description) = description else {
        bail!("No such table: {table}");
    };

    if target.json {
        return print_json(&description);
    }
    print_table(&description);
    Ok(())
}

fn print_table(description: &TableDescription) {
    println!("{}", description.table.cyan().bold());
    println!("{}", "─".repeat(60));

    for column in &description.columns {
        let mut flags = Vec::new();
        if column.primary_key {
            flags.push("PK".to_string());
        }
        if column.not_null {
            flags.push("NOT NULL".to_string());
        }
        if let Some(default) = &column.default_value {
            flags.push(format!("DEFAULT {default}"));
        }
        println!(
            "  {:<28} {:<10} {}",
            column.name,
            column.decl_type,
            flags.join(" ").dimmed()
        );
    }

    if !description.indexes.is_empty() {
        println!();
        println!("{}", "Indexes".bold());
        for index in &description.indexes {
            let kind = if index.unique { "unique" } else { "" };
            println!(
                "  {:<40} ({}) {}",
                index.name,
                index.columns.join(", "),
                kind.yellow()
            );
        }
    }
}
