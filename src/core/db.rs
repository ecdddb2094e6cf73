//! Low-level SQLite connection helpers for the Indexed Content Store.
//!
//! Callers outside `core::store`/`core::broker` should not open connections
//! directly — go through `StoreBroker::with_conn` so writes are serialized
//! and migrations have already run.

use crate::core::error::KontextError;
use crate::core::migration;
use crate::core::schema;
use rusqlite::Connection;
use std::path::Path;

/// Open a connection with the engine's standard pragmas:
/// WAL journaling, foreign keys on, and a busy timeout for lock contention.
pub fn connect(db_path: &Path, busy_timeout_secs: u64) -> Result<Connection, KontextError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(busy_timeout_secs))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}

/// Run every DDL statement (idempotent, `CREATE TABLE IF NOT EXISTS`), then
/// apply any pending schema migration above the database's recorded version.
pub fn ensure_schema(conn: &Connection) -> Result<(), KontextError> {
    for stmt in schema::all_ddl() {
        conn.execute(stmt, [])?;
    }
    Ok(())
}

/// Like `ensure_schema`, but also runs `core::migration::migrate` against
/// `db_path` — used by `StoreBroker::with_conn`, which knows the file path
/// a pre-migration backup would be copied to.
pub fn ensure_schema_and_migrate(
    conn: &Connection,
    db_path: &Path,
    force_migrations: bool,
) -> Result<(), KontextError> {
    ensure_schema(conn)?;
    migration::migrate(conn, db_path, force_migrations)
}
