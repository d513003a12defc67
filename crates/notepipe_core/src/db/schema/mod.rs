//! Schema version check with destructive recreation.
//!
//! # Responsibility
//! - Create the note table on empty storage.
//! - Recreate storage from scratch when the stored version differs.
//!
//! # Invariants
//! - After `ensure_schema` succeeds, `PRAGMA user_version == SCHEMA_VERSION`.
//! - Recreation runs in one transaction; a failure leaves the old data intact.

use crate::db::DbResult;
use log::{info, warn};
use rusqlite::{Connection, Transaction};

/// Schema version written by this binary.
pub const SCHEMA_VERSION: u32 = 1;

const NOTE_TABLE_SQL: &str = include_str!("note_table.sql");

/// Outcome of the schema check, used to decide whether seed data is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Storage was empty and the schema was created.
    Created,
    /// Storage already had the expected version.
    Current,
    /// Storage had another version; every table was dropped and recreated.
    Recreated { previous_version: u32 },
}

impl SchemaStatus {
    /// Whether storage starts out empty after this check.
    pub fn is_fresh(self) -> bool {
        !matches!(self, Self::Current)
    }
}

/// Brings `conn` to `SCHEMA_VERSION`.
pub fn ensure_schema(conn: &mut Connection) -> DbResult<SchemaStatus> {
    let current = current_user_version(conn)?;
    if current == SCHEMA_VERSION {
        info!("event=schema_check module=db status=ok version={current}");
        return Ok(SchemaStatus::Current);
    }

    let tx = conn.transaction()?;
    let dropped = drop_all_tables(&tx)?;
    tx.execute_batch(NOTE_TABLE_SQL)?;
    tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    tx.commit()?;

    if current == 0 {
        info!(
            "event=schema_check module=db status=created version={SCHEMA_VERSION} dropped_tables={dropped}"
        );
        Ok(SchemaStatus::Created)
    } else {
        warn!(
            "event=schema_check module=db status=recreated from_version={current} to_version={SCHEMA_VERSION} dropped_tables={dropped}"
        );
        Ok(SchemaStatus::Recreated {
            previous_version: current,
        })
    }
}

pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

fn drop_all_tables(tx: &Transaction<'_>) -> DbResult<usize> {
    let tables = {
        let mut stmt = tx.prepare(
            "SELECT name
             FROM sqlite_master
             WHERE type = 'table'
               AND name NOT LIKE 'sqlite_%';",
        )?;
        let mut rows = stmt.query([])?;
        let mut names = Vec::new();
        while let Some(row) = rows.next()? {
            names.push(row.get::<_, String>(0)?);
        }
        names
    };

    for table in &tables {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS \"{}\";", table.replace('"', "\"\"")))?;
    }
    Ok(tables.len())
}
