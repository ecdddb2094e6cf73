//! Scanner: walks a set of subdirectories under a project root, excludes by
//! pattern, and hashes what's left in parallel.

use crate::core::hash::{Hash16, hash_file_safe};
use crate::core::path::normalize;
use glob::Pattern;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_EXCLUDES: &[&str] = &[
    "node_modules",
    ".git",
    ".DS_Store",
    "*.log",
    ".k0ntext-manifest.json",
];

#[derive(Debug, Clone)]
pub struct ScanFile {
    pub relative_path: String,
    pub size: u64,
    pub mtime: String,
    pub hash: Hash16,
}

fn is_excluded(leaf: &str, patterns: &[Pattern]) -> bool {
    patterns
        .iter()
        .any(|p| p.matches(leaf) || leaf.contains(p.as_str()))
}

fn compile_patterns(exclude_patterns: &[String]) -> Vec<Pattern> {
    DEFAULT_EXCLUDES
        .iter()
        .map(|s| s.to_string())
        .chain(exclude_patterns.iter().cloned())
        .filter_map(|p| Pattern::new(&p).ok())
        .collect()
}

/// Recurses into each named subdirectory of `root`. A missing subdirectory
/// contributes nothing (not an error). Ordering of the result is unspecified.
pub fn scan_and_hash(root: &Path, subdirs: &[&str], exclude_patterns: &[String]) -> Vec<ScanFile> {
    let patterns = compile_patterns(exclude_patterns);
    let mut candidates: Vec<PathBuf> = Vec::new();

    for subdir in subdirs {
        let base = root.join(subdir);
        if !base.exists() {
            tracing::debug!(subdir = %base.display(), "scan subdirectory does not exist, skipping");
            continue;
        }
        tracing::debug!(subdir = %base.display(), "scanning subdirectory");
        let walker = WalkDir::new(&base).follow_links(true).into_iter().filter_entry(|e| {
            let leaf = e.file_name().to_string_lossy();
            !is_excluded(&leaf, &patterns)
        });
        for entry in walker {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path_is_symlink() && points_outside_root(entry.path(), root) {
                continue;
            }
            candidates.push(entry.into_path());
        }
    }

    tracing::debug!(candidates = candidates.len(), "hashing scan candidates in parallel");
    let files: Vec<ScanFile> = candidates
        .into_par_iter()
        .filter_map(|path| {
            let meta = path.metadata().ok()?;
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let relative_path = normalize(&relative.to_string_lossy());
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs().to_string())
                .unwrap_or_default();
            Some(ScanFile {
                relative_path,
                size: meta.len(),
                mtime,
                hash: hash_file_safe(&path),
            })
        })
        .collect();
    tracing::debug!(files = files.len(), "scan complete");
    files
}

fn points_outside_root(symlink_path: &Path, root: &Path) -> bool {
    let Ok(target) = std::fs::canonicalize(symlink_path) else {
        return true;
    };
    let Ok(root) = std::fs::canonicalize(root) else {
        return false;
    };
    !target.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn scans_and_hashes_files_under_named_subdir() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".claude/commands")).unwrap();
        fs::write(dir.path().join(".claude/CLAUDE.md"), "hello").unwrap();
        fs::write(dir.path().join(".claude/commands/a.md"), "a").unwrap();

        let files = scan_and_hash(dir.path(), &[".claude"], &[]);
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.relative_path == ".claude/CLAUDE.md"));
    }

    #[test]
    fn missing_subdir_yields_empty_contribution() {
        let dir = tempdir().unwrap();
        let files = scan_and_hash(dir.path(), &["does-not-exist"], &[]);
        assert!(files.is_empty());
    }

    #[test]
    fn default_excludes_skip_git_and_logs() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".claude/.git")).unwrap();
        fs::write(dir.path().join(".claude/.git/HEAD"), "ref").unwrap();
        fs::write(dir.path().join(".claude/debug.log"), "log").unwrap();
        fs::write(dir.path().join(".claude/keep.md"), "keep").unwrap();

        let files = scan_and_hash(dir.path(), &[".claude"], &[]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, ".claude/keep.md");
    }

    #[test]
    fn custom_exclude_pattern_is_honored() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".claude")).unwrap();
        fs::write(dir.path().join(".claude/a.tmp"), "x").unwrap();
        fs::write(dir.path().join(".claude/a.md"), "x").unwrap();

        let files = scan_and_hash(dir.path(), &[".claude"], &["*.tmp".to_string()]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, ".claude/a.md");
    }
}
