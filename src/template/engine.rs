//! Template Sync Engine: orchestrates Scanner → Comparator →
//! {Merger, Conflict Resolver} → manifest rebuild in eleven ordered steps.

use crate::core::cancel::CancellationToken;
use crate::core::config::EngineConfig;
use crate::core::error::KontextError;
use crate::core::hash::Hash16;
use crate::core::model::{Metadata, TemplateFileEntry};
use crate::core::store::Store;
use crate::core::time::{now_rfc3339, now_rfc3339_filename_safe};
use crate::scan::scanner::scan_and_hash;
use crate::template::comparator::{ComparisonState, FileComparison, compare_trees};
use crate::template::manifest;
use crate::template::merger::Merger;
use crate::template::resolver::{ConflictDecision, ResolutionStrategy};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub dry_run: bool,
    pub archive_removed: bool,
    /// The version tag of the template tree currently being synced from.
    pub template_version: String,
    pub k0ntext_version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConflictOutcome {
    pub path: String,
    pub decision: ConflictDecision,
}

#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub created: usize,
    pub updated: usize,
    pub skipped: Vec<String>,
    pub conflicts: Vec<ConflictOutcome>,
    pub user_only: Vec<String>,
    pub archived: Vec<String>,
    pub deleted: Vec<String>,
    pub per_file_errors: Vec<(String, String)>,
    pub dry_run: bool,
    pub duration_ms: u64,
}

pub struct TemplateSyncEngine<'a> {
    pub template_root: &'a Path,
    pub working_root: &'a Path,
    pub store: &'a Store,
    pub config: &'a EngineConfig,
}

impl<'a> TemplateSyncEngine<'a> {
    pub fn new(
        template_root: &'a Path,
        working_root: &'a Path,
        store: &'a Store,
        config: &'a EngineConfig,
    ) -> Self {
        Self { template_root, working_root, store, config }
    }

    fn scan_tree(&self, root: &Path) -> BTreeMap<String, Hash16> {
        scan_and_hash(root, &[""], &self.config.extra_excludes)
            .into_iter()
            .map(|f| (f.relative_path, f.hash))
            .collect()
    }

    fn check_cancelled(&self, cancel: &CancellationToken) -> Result<(), KontextError> {
        if cancel.is_cancelled() {
            tracing::warn!("template sync cancelled mid-phase");
            return Err(KontextError::Cancelled);
        }
        Ok(())
    }

    /// True if a version bump alone is pending, or the comparator reports
    /// any row that isn't `identical` — distinguishing a template version
    /// bump from latent drift.
    pub fn needs_sync(&self, current_version: &str) -> Result<bool, KontextError> {
        let manifest = manifest::load_reconciled(
            self.store,
            &self.config.manifest_path(),
            env!("CARGO_PKG_VERSION"),
        )?;
        if manifest::needs_update(&manifest, current_version) {
            return Ok(true);
        }
        let template_files = self.scan_tree(self.template_root);
        let local_files = self.scan_tree(self.working_root);
        let rows = compare_trees(&template_files, &local_files, &manifest.files);
        Ok(rows.iter().any(|r| r.state != ComparisonState::Identical))
    }

    /// Runs the full eleven-step algorithm. `resolver` drives every
    /// `conflict` row; it is never invoked when `options.dry_run` is set.
    pub fn sync(
        &self,
        options: &SyncOptions,
        resolver: &mut dyn ResolutionStrategy,
        cancel: &CancellationToken,
    ) -> Result<SyncResult, KontextError> {
        let started = std::time::Instant::now();
        tracing::info!(
            template_version = %options.template_version,
            dry_run = options.dry_run,
            "template sync starting"
        );

        // Steps 1-3: scan, load reconciled manifest, classify.
        let template_files = self.scan_tree(self.template_root);
        let local_files = self.scan_tree(self.working_root);
        let mut loaded_manifest = manifest::load_reconciled(
            self.store,
            &self.config.manifest_path(),
            &options.k0ntext_version,
        )?;
        let rows = compare_trees(&template_files, &local_files, &loaded_manifest.files);
        tracing::debug!(rows = rows.len(), "template tree classified");

        let mut result = SyncResult { dry_run: options.dry_run, ..Default::default() };

        // Step 5: dry run emits a report and returns without touching disk.
        if options.dry_run {
            for row in &rows {
                match row.state {
                    ComparisonState::New => result.created += 1,
                    ComparisonState::SafeUpdate => result.updated += 1,
                    ComparisonState::Conflict => {
                        result.conflicts.push(ConflictOutcome { path: row.path.clone(), decision: ConflictDecision::Skip });
                    }
                    ComparisonState::UserOnly => result.user_only.push(row.path.clone()),
                    ComparisonState::Deleted => result.deleted.push(row.path.clone()),
                    ComparisonState::Identical => {}
                }
            }
            result.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(result);
        }

        let merger = Merger::new(self.template_root, self.working_root, self.config.backup_strategy);

        // Step 6: safe-updates and new files.
        for row in rows.iter().filter(|r| r.state == ComparisonState::New) {
            self.check_cancelled(cancel)?;
            match merger.apply_new(row) {
                Ok(_) => result.created += 1,
                Err(e) => {
                    tracing::warn!(path = %row.path, error = %e, "failed to create new template file");
                    result.per_file_errors.push((row.path.clone(), e.to_string()));
                }
            }
        }
        for row in rows.iter().filter(|r| r.state == ComparisonState::SafeUpdate) {
            self.check_cancelled(cancel)?;
            match merger.apply_safe_update(row) {
                Ok(_) => result.updated += 1,
                Err(e) => {
                    tracing::warn!(path = %row.path, error = %e, "failed to apply safe update");
                    result.per_file_errors.push((row.path.clone(), e.to_string()));
                }
            }
        }
        for row in rows.iter().filter(|r| r.state == ComparisonState::Identical) {
            result.skipped.push(row.path.clone());
        }

        // Step 7: conflicts, lexicographic order (compare_trees already sorts).
        for row in rows.iter().filter(|r| r.state == ComparisonState::Conflict) {
            self.check_cancelled(cancel)?;
            let local_text = std::fs::read_to_string(self.working_root.join(&row.path)).unwrap_or_default();
            let template_text = std::fs::read_to_string(self.template_root.join(&row.path)).unwrap_or_default();
            let diff = merger.diff(&local_text, &template_text);
            let decision = resolver.resolve(row, &diff);
            tracing::debug!(path = %row.path, decision = ?decision, "conflict resolved");
            result.conflicts.push(ConflictOutcome { path: row.path.clone(), decision });

            match decision {
                ConflictDecision::Overwrite => match merger.apply_conflict(row, true) {
                    Ok(_) => result.updated += 1,
                    Err(e) => {
                        tracing::warn!(path = %row.path, error = %e, "failed to overwrite conflicting file");
                        result.per_file_errors.push((row.path.clone(), e.to_string()));
                    }
                },
                ConflictDecision::KeepLocal | ConflictDecision::Skip => {
                    result.skipped.push(row.path.clone());
                }
            }
        }

        // Step 8: archival of user-only and deleted files.
        let user_only_rows: Vec<&FileComparison> =
            rows.iter().filter(|r| r.state == ComparisonState::UserOnly).collect();
        let deleted_rows: Vec<&FileComparison> =
            rows.iter().filter(|r| r.state == ComparisonState::Deleted).collect();

        if options.archive_removed {
            for row in user_only_rows.iter().chain(deleted_rows.iter()) {
                self.check_cancelled(cancel)?;
                let src = self.working_root.join(&row.path);
                if !src.exists() {
                    continue;
                }
                match self.archive_file(&src, &row.path) {
                    Ok(_) => result.archived.push(row.path.clone()),
                    Err(e) => {
                        tracing::warn!(path = %row.path, error = %e, "failed to archive removed file");
                        result.per_file_errors.push((row.path.clone(), e.to_string()));
                    }
                }
            }
        }
        for row in &deleted_rows {
            let src = self.working_root.join(&row.path);
            if src.exists() {
                std::fs::remove_file(&src)?;
            }
            result.deleted.push(row.path.clone());
        }
        for row in &user_only_rows {
            result.user_only.push(row.path.clone());
        }

        // Step 9: rebuild the manifest.
        let conflict_decisions: std::collections::HashMap<&str, ConflictDecision> =
            result.conflicts.iter().map(|c| (c.path.as_str(), c.decision)).collect();

        let mut rebuilt = crate::core::model::TemplateManifest::new(
            options.k0ntext_version.clone(),
            options.template_version.clone(),
        );
        for row in rows.iter().filter(|r| template_files.contains_key(&r.path)) {
            let Some(hash) = template_files.get(&row.path) else { continue };
            let kept_local = matches!(conflict_decisions.get(row.path.as_str()), Some(ConflictDecision::KeepLocal));
            let user_modified = kept_local;
            let original_hash = if user_modified {
                row.manifest_hash.clone().or_else(|| row.template_hash.clone())
            } else {
                None
            };
            manifest::update_entry(
                &mut rebuilt,
                &row.path,
                TemplateFileEntry {
                    hash: hash.clone(),
                    template_version: options.template_version.clone(),
                    user_modified,
                    original_hash,
                    last_synced_at: now_rfc3339(),
                },
            );
        }
        rebuilt.updated_at = now_rfc3339();
        manifest::save_both(&rebuilt, self.store, &self.config.manifest_path())?;
        loaded_manifest = rebuilt;

        // Step 10: generated-file / user-modified tracking.
        let any_user_modified = !manifest::get_user_modified_paths(&loaded_manifest).is_empty();
        self.store.update_version_tracking(
            "claude",
            &options.template_version,
            any_user_modified,
            &now_rfc3339(),
            None,
            None,
        )?;
        for (path, entry) in &loaded_manifest.files {
            let content = std::fs::read_to_string(self.working_root.join(path)).unwrap_or_default();
            self.store.upsert_item(
                crate::core::model::ItemType::TemplateFile,
                path,
                Some(&format!(".claude/{path}")),
                &content,
                Metadata::new(),
            )?;
            let _ = entry;
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            created = result.created,
            updated = result.updated,
            conflicts = result.conflicts.len(),
            archived = result.archived.len(),
            deleted = result.deleted.len(),
            errors = result.per_file_errors.len(),
            duration_ms = result.duration_ms,
            "template sync finished"
        );
        Ok(result)
    }

    fn archive_file(&self, src: &Path, rel_path: &str) -> Result<PathBuf, KontextError> {
        let dest = self
            .config
            .archive_dir()
            .join(format!("{}.{}.archived", rel_path, now_rfc3339_filename_safe()));
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(src, &dest)?;
        Ok(dest)
    }
}
