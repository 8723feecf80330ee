//! SQLite history index.
//!
//! Runtime pragmas:
//! - `journal_mode = WAL` so the CLI can read while a tracker writes
//! - `busy_timeout = 5s` to ride out short lock contention between processes

pub mod migrations;
pub mod schema;

use crate::StorageResult;
use rusqlite::Connection;
use std::{path::Path, time::Duration};

/// Busy timeout used for index connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// File name of the index database inside the data directory.
pub const INDEX_DB_FILE: &str = "history.db";

/// Open (or create) the index database, apply pragmas and migrate.
pub fn open_index(path: &Path) -> StorageResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut conn = Connection::open(path)?;
    configure_connection(&conn)?;
    migrations::migrate(&mut conn)?;

    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}
