//! SQLite-backed event store.
//!
//! Runtime defaults follow the usual read-mostly setup:
//! - `journal_mode = WAL` so readers do not block an import in progress
//! - `busy_timeout = 5s` to ride out transient lock contention
//! - `foreign_keys = ON` for graph membership rows

pub mod import;
pub mod migrations;
pub mod query;
pub mod schema;

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

use crate::error::ErrorCode;

pub use import::{ImportStats, import_log, import_records};
pub use query::SqliteStore;

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) a store database, apply runtime pragmas, and migrate the
/// schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening, configuring, or migrating the database fails.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create store directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open store database {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply store migrations")?;

    Ok(conn)
}

/// Open an existing store database; never creates one.
///
/// # Errors
///
/// Returns an error if `path` does not exist or cannot be opened.
pub fn open_existing(path: &Path) -> Result<Connection> {
    if !path.exists() {
        bail!(
            "{} [{}]: {}",
            ErrorCode::StoreNotFound.message(),
            ErrorCode::StoreNotFound.code(),
            path.display()
        );
    }
    open_store(path)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}
