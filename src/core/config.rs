//! Engine-wide configuration.
//!
//! Built from defaults, then overridden from environment variables at the
//! single seam `EngineConfig::from_env` — the rest of the engine never reads
//! `std::env` directly.

use std::path::PathBuf;

/// How a conflicting local file is protected before the merger overwrites it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BackupStrategy {
    /// Write `<basename>.backup-<timestamp>` alongside the target.
    TimestampedFile,
    /// `git stash push` the file, recording the stash ref.
    GitStash,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    /// Project root; defaults to the current working directory.
    pub project_root: PathBuf,
    /// Worker pool size for the Scanner and Drift Detector. Defaults to the
    /// number of logical CPUs.
    pub worker_threads: usize,
    /// Write-lock contention timeout before a call fails with `Busy`.
    pub writer_lock_timeout_secs: u64,
    /// Embedding vector dimension, fixed for the lifetime of a store.
    pub embedding_dim: usize,
    /// Default text/vector weight for hybrid search (text_weight, vector_weight).
    pub hybrid_search_weights: (f32, f32),
    /// Additional exclude patterns beyond the Scanner's built-in defaults.
    pub extra_excludes: Vec<String>,
    /// How the Template Merger protects a file it's about to overwrite.
    pub backup_strategy: BackupStrategy,
    /// Whether `TemplateSyncEngine::sync` archives `user-only`/`deleted` files.
    pub archive_removed: bool,
    /// Host bypass for git hooks; consumed, never interpreted, by this crate.
    pub skip_hooks: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            writer_lock_timeout_secs: 5,
            embedding_dim: 384,
            hybrid_search_weights: (0.5, 0.5),
            extra_excludes: Vec::new(),
            backup_strategy: BackupStrategy::TimestampedFile,
            archive_removed: true,
            skip_hooks: false,
        }
    }
}

impl EngineConfig {
    /// Apply the environment variables this engine recognizes. Absence of
    /// any of them is never an error.
    pub fn from_env(mut self) -> Self {
        if let Ok(root) = std::env::var("K0NTEXT_PROJECT_ROOT") {
            self.project_root = PathBuf::from(root);
        }
        if std::env::var("K0NTEXT_SKIP_HOOKS").is_ok() {
            self.skip_hooks = true;
        }
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.project_root.join(".k0ntext.db")
    }

    pub fn claude_dir(&self) -> PathBuf {
        self.project_root.join(".claude")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.claude_dir().join(".k0ntext-manifest.json")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.project_root.join(".k0ntext").join("archive")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.project_root.join(".k0ntext").join("backups")
    }
}
