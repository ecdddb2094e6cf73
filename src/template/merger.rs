//! Template Merger: applies one classified `FileComparison`.

use crate::core::config::BackupStrategy;
use crate::core::error::KontextError;
use crate::core::time::now_rfc3339_filename_safe;
use crate::template::comparator::{ComparisonState, FileComparison};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMethod {
    Skip,
    AutoCreate,
    AutoSafe,
    Overwrite,
    Defer,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub path: String,
    pub method: MergeMethod,
    /// Either a `<basename>.backup-<RFC3339>` path or `git-stash:<ref>`,
    /// present whenever a local file was overwritten.
    pub backup_ref: Option<String>,
}

pub struct Merger<'a> {
    pub template_root: &'a Path,
    pub working_root: &'a Path,
    pub backup_strategy: BackupStrategy,
}

impl<'a> Merger<'a> {
    pub fn new(template_root: &'a Path, working_root: &'a Path, backup_strategy: BackupStrategy) -> Self {
        Self { template_root, working_root, backup_strategy }
    }

    fn template_path(&self, rel: &str) -> PathBuf {
        self.template_root.join(rel)
    }

    fn working_path(&self, rel: &str) -> PathBuf {
        self.working_root.join(rel)
    }

    /// `new`: create the destination file and its parent directories,
    /// copying template bytes verbatim.
    pub fn apply_new(&self, comparison: &FileComparison) -> Result<MergeOutcome, KontextError> {
        debug_assert_eq!(comparison.state, ComparisonState::New);
        let dest = self.working_path(&comparison.path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(self.template_path(&comparison.path), &dest)?;
        Ok(MergeOutcome { path: comparison.path.clone(), method: MergeMethod::AutoCreate, backup_ref: None })
    }

    /// `safe-update`: back up the local file, then overwrite with template
    /// bytes.
    pub fn apply_safe_update(&self, comparison: &FileComparison) -> Result<MergeOutcome, KontextError> {
        debug_assert_eq!(comparison.state, ComparisonState::SafeUpdate);
        let dest = self.working_path(&comparison.path);
        let backup_ref = self.backup(&dest)?;
        std::fs::copy(self.template_path(&comparison.path), &dest)?;
        Ok(MergeOutcome {
            path: comparison.path.clone(),
            method: MergeMethod::AutoSafe,
            backup_ref: Some(backup_ref),
        })
    }

    /// `conflict`, once the Conflict Resolver has decided: either overwrite
    /// (with backup) or skip, never anything else.
    pub fn apply_conflict(
        &self,
        comparison: &FileComparison,
        overwrite: bool,
    ) -> Result<MergeOutcome, KontextError> {
        debug_assert_eq!(comparison.state, ComparisonState::Conflict);
        if !overwrite {
            return Ok(MergeOutcome { path: comparison.path.clone(), method: MergeMethod::Skip, backup_ref: None });
        }
        let dest = self.working_path(&comparison.path);
        let backup_ref = self.backup(&dest)?;
        std::fs::copy(self.template_path(&comparison.path), &dest)?;
        Ok(MergeOutcome {
            path: comparison.path.clone(),
            method: MergeMethod::Overwrite,
            backup_ref: Some(backup_ref),
        })
    }

    /// `identical`: no-op.
    pub fn apply_identical(&self, comparison: &FileComparison) -> MergeOutcome {
        MergeOutcome { path: comparison.path.clone(), method: MergeMethod::Skip, backup_ref: None }
    }

    /// Exactly one of {timestamped-file backup, git-stash} per invocation,
    /// chosen statically by `self.backup_strategy`.
    fn backup(&self, target: &Path) -> Result<String, KontextError> {
        match self.backup_strategy {
            BackupStrategy::TimestampedFile => self.backup_timestamped_file(target),
            BackupStrategy::GitStash => self.backup_git_stash(target),
        }
    }

    fn backup_timestamped_file(&self, target: &Path) -> Result<String, KontextError> {
        let backup_path = target.with_file_name(format!(
            "{}.backup-{}",
            target.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
            now_rfc3339_filename_safe(),
        ));
        std::fs::copy(target, &backup_path)?;
        Ok(backup_path.display().to_string())
    }

    fn backup_git_stash(&self, target: &Path) -> Result<String, KontextError> {
        let rel = target.strip_prefix(self.working_root).unwrap_or(target);
        let output = Command::new("git")
            .args([
                "-C",
                &self.working_root.to_string_lossy(),
                "stash",
                "push",
                "--",
                &rel.to_string_lossy(),
            ])
            .output()
            .map_err(KontextError::IoFailure)?;
        if !output.status.success() {
            return Err(KontextError::IoFailure(std::io::Error::other(format!(
                "git stash push failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ))));
        }
        let rev_output = Command::new("git")
            .args(["-C", &self.working_root.to_string_lossy(), "rev-parse", "stash@{0}"])
            .output()
            .map_err(KontextError::IoFailure)?;
        let stash_ref = String::from_utf8_lossy(&rev_output.stdout).trim().to_string();
        Ok(format!("git-stash:{stash_ref}"))
    }

    /// A unified textual diff for verbose-mode display; never persisted.
    pub fn diff(&self, local: &str, template: &str) -> String {
        use similar::{ChangeTag, TextDiff};
        let diff = TextDiff::from_lines(local, template);
        let mut out = String::new();
        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            out.push_str(sign);
            out.push_str(&change.to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::hash_content;
    use std::fs;
    use tempfile::tempdir;

    fn comparison(path: &str, state: ComparisonState) -> FileComparison {
        FileComparison {
            path: path.to_string(),
            state,
            template_hash: Some(hash_content("template")),
            local_hash: Some(hash_content("local")),
            manifest_hash: None,
            user_modified: state == ComparisonState::Conflict,
            original_hash: None,
        }
    }

    #[test]
    fn apply_new_creates_file_and_parents() {
        let dir = tempdir().unwrap();
        let template_root = dir.path().join("template");
        let working_root = dir.path().join("working");
        fs::create_dir_all(template_root.join("commands")).unwrap();
        fs::write(template_root.join("commands/init.md"), "hello\n").unwrap();

        let merger = Merger::new(&template_root, &working_root, BackupStrategy::TimestampedFile);
        let outcome = merger
            .apply_new(&comparison("commands/init.md", ComparisonState::New))
            .unwrap();

        assert_eq!(outcome.method, MergeMethod::AutoCreate);
        assert_eq!(fs::read_to_string(working_root.join("commands/init.md")).unwrap(), "hello\n");
    }

    #[test]
    fn apply_safe_update_backs_up_then_overwrites() {
        let dir = tempdir().unwrap();
        let template_root = dir.path().join("template");
        let working_root = dir.path().join("working");
        fs::create_dir_all(&template_root).unwrap();
        fs::create_dir_all(&working_root).unwrap();
        fs::write(template_root.join("x.md"), "new bytes\n").unwrap();
        fs::write(working_root.join("x.md"), "old bytes\n").unwrap();

        let merger = Merger::new(&template_root, &working_root, BackupStrategy::TimestampedFile);
        let outcome = merger
            .apply_safe_update(&comparison("x.md", ComparisonState::SafeUpdate))
            .unwrap();

        assert_eq!(outcome.method, MergeMethod::AutoSafe);
        assert_eq!(fs::read_to_string(working_root.join("x.md")).unwrap(), "new bytes\n");
        let backup_path = PathBuf::from(outcome.backup_ref.unwrap());
        assert_eq!(fs::read_to_string(backup_path).unwrap(), "old bytes\n");
    }

    #[test]
    fn apply_conflict_skip_leaves_local_untouched() {
        let dir = tempdir().unwrap();
        let template_root = dir.path().join("template");
        let working_root = dir.path().join("working");
        fs::create_dir_all(&template_root).unwrap();
        fs::create_dir_all(&working_root).unwrap();
        fs::write(template_root.join("x.md"), "template\n").unwrap();
        fs::write(working_root.join("x.md"), "local-edit\n").unwrap();

        let merger = Merger::new(&template_root, &working_root, BackupStrategy::TimestampedFile);
        let outcome = merger
            .apply_conflict(&comparison("x.md", ComparisonState::Conflict), false)
            .unwrap();

        assert_eq!(outcome.method, MergeMethod::Skip);
        assert!(outcome.backup_ref.is_none());
        assert_eq!(fs::read_to_string(working_root.join("x.md")).unwrap(), "local-edit\n");
    }

    #[test]
    fn apply_conflict_overwrite_backs_up_first() {
        let dir = tempdir().unwrap();
        let template_root = dir.path().join("template");
        let working_root = dir.path().join("working");
        fs::create_dir_all(&template_root).unwrap();
        fs::create_dir_all(&working_root).unwrap();
        fs::write(template_root.join("x.md"), "template\n").unwrap();
        fs::write(working_root.join("x.md"), "local-edit\n").unwrap();

        let merger = Merger::new(&template_root, &working_root, BackupStrategy::TimestampedFile);
        let outcome = merger
            .apply_conflict(&comparison("x.md", ComparisonState::Conflict), true)
            .unwrap();

        assert_eq!(outcome.method, MergeMethod::Overwrite);
        assert!(outcome.backup_ref.is_some());
        assert_eq!(fs::read_to_string(working_root.join("x.md")).unwrap(), "template\n");
    }

    #[test]
    fn diff_marks_removed_and_added_lines() {
        let dir = tempdir().unwrap();
        let merger = Merger::new(dir.path(), dir.path(), BackupStrategy::TimestampedFile);
        let out = merger.diff("one\ntwo\n", "one\nthree\n");
        assert!(out.contains("-two"));
        assert!(out.contains("+three"));
    }
}
