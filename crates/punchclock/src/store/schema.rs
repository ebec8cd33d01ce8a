//! `SQLite` schema and versioning for the key-value store.
//!
//! The schema version lives in `PRAGMA user_version`. Each entry in
//! [`MIGRATIONS`] upgrades the database by one version.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Error, Result};

/// Version 1: the key-value table.
const CREATE_KV_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// Migrations in order; index `i` upgrades from version `i` to `i + 1`.
const MIGRATIONS: &[&str] = &[CREATE_KV_TABLE];

/// The schema version this build writes.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const CURRENT_VERSION: i32 = MIGRATIONS.len() as i32;

/// Bring the database up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if a migration fails or the database was written by a
/// newer version.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = schema_version(conn)?;

    if version > CURRENT_VERSION {
        return Err(Error::storage(format!(
            "database schema version {version} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    for (index, statement) in MIGRATIONS.iter().enumerate().skip(version_index(version)) {
        let target = i32::try_from(index + 1).unwrap_or(i32::MAX);
        conn.execute_batch(statement)?;
        conn.execute_batch(&format!("PRAGMA user_version = {target}"))?;
        info!("Migrated store schema to version {}", target);
    }

    Ok(())
}

/// Read the stored schema version (0 for a fresh database).
///
/// # Errors
///
/// Returns an error if the pragma cannot be read.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

fn version_index(version: i32) -> usize {
    usize::try_from(version).unwrap_or(0)
}
