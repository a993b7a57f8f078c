//! SQLite database utilities.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so report readers see a snapshot while a writer commits
//! - `busy_timeout = 5s` bounds how long a writer waits for the write lock
//! - `foreign_keys = ON` so ticket and change order references stay valid

pub mod migrations;
pub mod query;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

/// Busy timeout used for database connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// File name of the database inside the `.tally` directory.
pub const DB_FILE_NAME: &str = "tally.sqlite3";

/// Open (or create) the workspace database and bring its schema up to date.
///
/// # Errors
///
/// Returns an error if the directory cannot be created, or opening,
/// configuring, or migrating the file fails.
pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create database directory {}", parent.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("open database {}", path.display()))?;
    prepare(conn, Storage::File)
}

/// Open a private in-memory database with the latest schema.
///
/// # Errors
///
/// Returns an error if configuring or migrating the database fails.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    prepare(conn, Storage::Memory)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    File,
    Memory,
}

fn prepare(mut conn: Connection, storage: Storage) -> Result<Connection> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("enable foreign keys")?;
    if storage == Storage::File {
        // Settings for a file shared between processes.
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("set synchronous mode")?;
        let _mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .context("enable WAL journal")?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)
            .context("set busy timeout")?;
    }
    let version = migrations::migrate(&mut conn).context("apply schema migrations")?;
    tracing::debug!(version, storage = ?storage, "database ready");
    Ok(conn)
}
