//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections for the note table.
//! - Run the schema check before handing a connection out.
//!
//! # Invariants
//! - Returned connections carry `SCHEMA_VERSION`.
//! - The caller learns whether storage started empty (`SchemaStatus`).

use super::schema::{ensure_schema, SchemaStatus};
use super::DbResult;
use crate::config::{StoreConfig, StoreLocation};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Bootstrapped connection plus the outcome of its schema check.
#[derive(Debug)]
pub struct OpenedDb {
    pub conn: Connection,
    pub status: SchemaStatus,
}

/// Opens the store described by `config`.
pub fn open_store(config: &StoreConfig) -> DbResult<OpenedDb> {
    match &config.location {
        StoreLocation::File(path) => open_db(path),
        StoreLocation::Memory => open_db_in_memory(),
    }
}

/// Opens a SQLite database file, creating parent directories as needed.
///
/// # Side effects
/// - May drop and recreate every table when the stored version differs.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<OpenedDb> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    open_with("file", || Connection::open(path))
}

/// Opens an in-memory SQLite database with a fresh schema.
pub fn open_db_in_memory() -> DbResult<OpenedDb> {
    open_with("memory", Connection::open_in_memory)
}

fn open_with<F>(mode: &'static str, connect: F) -> DbResult<OpenedDb>
where
    F: FnOnce() -> rusqlite::Result<Connection>,
{
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = connect().map_err(|err| {
        error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={err}",
            started_at.elapsed().as_millis()
        );
        err
    })?;

    match bootstrap_connection(&mut conn) {
        Ok(status) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={} schema={status:?}",
                started_at.elapsed().as_millis()
            );
            Ok(OpenedDb { conn, status })
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<SchemaStatus> {
    conn.busy_timeout(Duration::from_secs(5))?;
    ensure_schema(conn)
}
