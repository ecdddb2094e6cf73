//! Schema migration runner (§4.3): the store's on-disk schema version is the
//! highest `version` row recorded in `schema_meta`. Every migration whose
//! version is above that is applied in order, each preceded by a full
//! database file backup; a migration marked `breaking` refuses to run at all
//! unless the caller opted in via `force`.

use crate::core::error::KontextError;
use crate::core::time::now_rfc3339;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};

pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    /// A migration that can discard data (e.g. a dimension change that drops
    /// embeddings) requires `force`; a purely additive one never does.
    pub breaking: bool,
    pub up: fn(&Connection) -> Result<(), KontextError>,
}

/// All migrations in ascending version order. Version 1 is the schema this
/// crate ships with, so it has no work to do — it exists only so the ledger
/// has a row to compare future versions against.
fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "initial schema",
        breaking: false,
        up: |_conn| Ok(()),
    }]
}

pub fn current_version(conn: &Connection) -> Result<u32, KontextError> {
    let version: Option<i64> = conn
        .query_row("SELECT MAX(version) FROM schema_meta", [], |r| r.get(0))
        .optional()?
        .flatten();
    Ok(version.unwrap_or(0) as u32)
}

/// Applies every migration above the database's current recorded version.
/// `force` must be true for the run to proceed past a `breaking` migration;
/// otherwise it stops and returns `InvalidData` before touching anything.
pub fn migrate(conn: &Connection, db_path: &Path, force: bool) -> Result<(), KontextError> {
    let applied = current_version(conn)?;
    let mut pending: Vec<Migration> = all_migrations().into_iter().filter(|m| m.version > applied).collect();
    pending.sort_by_key(|m| m.version);
    run_pending(conn, db_path, force, pending)
}

fn run_pending(
    conn: &Connection,
    db_path: &Path,
    force: bool,
    pending: Vec<Migration>,
) -> Result<(), KontextError> {
    for migration in &pending {
        if migration.breaking && !force {
            return Err(KontextError::InvalidData(format!(
                "migration to schema version {} ({}) is breaking; re-run with force=true to apply it",
                migration.version, migration.description
            )));
        }
        backup_before_migration(db_path, migration.version)?;
        let txn = conn.unchecked_transaction()?;
        (migration.up)(&txn)?;
        txn.execute(
            "INSERT INTO schema_meta (version, applied_at) VALUES (?1, ?2)",
            params![migration.version, now_rfc3339()],
        )?;
        txn.commit()?;
    }
    Ok(())
}

fn backup_before_migration(db_path: &Path, version: u32) -> Result<(), KontextError> {
    if !db_path.exists() {
        return Ok(());
    }
    let backup_path = backup_path_for(db_path, version);
    std::fs::copy(db_path, &backup_path)?;
    Ok(())
}

fn backup_path_for(db_path: &Path, version: u32) -> PathBuf {
    let name = db_path.file_name().and_then(|n| n.to_str()).unwrap_or("store.db");
    db_path.with_file_name(format!("{name}.pre-{version}.bak"))
}
