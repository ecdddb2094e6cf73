//! Serialized write access to the Indexed Content Store.
//!
//! A per-database-path mutex guards every mutating call, and each call
//! appends a JSON-lines audit record. This is what gives the store its
//! single-writer, concurrent-readers guarantee, and its guarantee that every
//! write touching more than one row executes atomically — the mutex boundary
//! and the SQLite transaction boundary are the same call.

use crate::core::db;
use crate::core::error::KontextError;
use crate::core::time;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub event_id: String,
    pub ts: String,
    pub op: String,
    pub db_path: String,
    pub status: String,
}

fn lock_registry() -> &'static Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_for(db_path: &Path) -> Arc<Mutex<()>> {
    let mut registry = lock_registry().lock().unwrap_or_else(|e| e.into_inner());
    registry
        .entry(db_path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Serializes mutating access to one SQLite-backed store and records an
/// append-only audit trail of every call.
pub struct StoreBroker {
    audit_log_path: PathBuf,
    busy_timeout_secs: u64,
    force_migrations: bool,
}

impl StoreBroker {
    pub fn new(root: &Path, busy_timeout_secs: u64) -> Self {
        Self {
            audit_log_path: root.join(".k0ntext").join("broker.events.jsonl"),
            busy_timeout_secs,
            force_migrations: false,
        }
    }

    /// Opts this broker into applying `breaking` schema migrations without a
    /// separate confirmation step. Off by default: migrations that can
    /// discard data must never apply silently.
    pub fn allow_breaking_migrations(mut self) -> Self {
        self.force_migrations = true;
        self
    }

    /// Execute `f` with a freshly opened, schema-ensured connection, holding
    /// the per-database mutex for the duration. A poisoned mutex (a prior
    /// call panicked mid-transaction) is treated as sustained contention —
    /// `Busy` — rather than propagating the poison panic, since the lock's
    /// `Drop` guarantees release on every exit path including panics.
    pub fn with_conn<F, R>(&self, db_path: &Path, op: &str, f: F) -> Result<R, KontextError>
    where
        F: FnOnce(&Connection) -> Result<R, KontextError>,
    {
        let lock = lock_for(db_path);
        let deadline = Instant::now() + Duration::from_secs(self.busy_timeout_secs.max(1));
        let _guard = loop {
            match lock.try_lock() {
                Ok(guard) => break guard,
                Err(std::sync::TryLockError::Poisoned(_)) => {
                    return Err(KontextError::Busy(format!(
                        "lock for {} was poisoned by a prior failure",
                        db_path.display()
                    )));
                }
                Err(std::sync::TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        self.log_event(op, db_path, "busy")?;
                        return Err(KontextError::Busy(format!(
                            "timed out waiting for write lock on {}",
                            db_path.display()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        };

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = db::connect(db_path, self.busy_timeout_secs)?;
        db::ensure_schema_and_migrate(&conn, db_path, self.force_migrations)?;

        let tx_result = (|| -> Result<R, KontextError> {
            conn.execute("BEGIN IMMEDIATE", [])?;
            let result = f(&conn);
            match &result {
                Ok(_) => conn.execute("COMMIT", [])?,
                Err(_) => conn.execute("ROLLBACK", [])?,
            };
            result
        })();

        self.log_event(op, db_path, if tx_result.is_ok() { "success" } else { "error" })?;
        tx_result
    }

    fn log_event(&self, op: &str, db_path: &Path, status: &str) -> Result<(), KontextError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        if let Some(parent) = self.audit_log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let event = BrokerEvent {
            event_id: time::new_event_id(),
            ts: time::now_rfc3339(),
            op: op.to_string(),
            db_path: db_path.display().to_string(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)?;
        writeln!(f, "{}", serde_json::to_string(&event).unwrap_or_default())?;
        Ok(())
    }
}
