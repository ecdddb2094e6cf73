//! Template Comparator: a pure three-way classifier, no I/O.
//!
//! `classify` is a function of three optional hashes (template / local /
//! manifest-recorded), so the full state table is exhaustively unit-testable
//! without a filesystem.

use crate::core::hash::Hash16;
use crate::core::model::TemplateFileEntry;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonState {
    New,
    Identical,
    SafeUpdate,
    Conflict,
    UserOnly,
    Deleted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileComparison {
    pub path: String,
    pub state: ComparisonState,
    pub template_hash: Option<Hash16>,
    pub local_hash: Option<Hash16>,
    pub manifest_hash: Option<Hash16>,
    pub user_modified: bool,
    pub original_hash: Option<Hash16>,
}

/// The state-assignment heart of the sync, as a pure function of the three
/// hashes involved for one path. A template/local pair that converges to
/// identical bytes is always `Identical`, even if the manifest disagrees —
/// checked before consulting the manifest at all.
pub fn classify(
    template_hash: Option<&Hash16>,
    local_hash: Option<&Hash16>,
    manifest_entry: Option<&TemplateFileEntry>,
) -> ComparisonState {
    match (template_hash, local_hash) {
        (Some(_), None) => ComparisonState::New,
        (Some(t), Some(l)) if l == t => ComparisonState::Identical,
        (Some(_), Some(l)) => match manifest_entry {
            Some(entry) if &entry.hash == l => ComparisonState::SafeUpdate,
            _ => ComparisonState::Conflict,
        },
        (None, Some(_)) => {
            if manifest_entry.is_some() {
                ComparisonState::Deleted
            } else {
                ComparisonState::UserOnly
            }
        }
        (None, None) => {
            if manifest_entry.is_some() {
                ComparisonState::Deleted
            } else {
                ComparisonState::Identical
            }
        }
    }
}

/// Compares the full template tree against the full working copy, given the
/// reconciled manifest. Produces one `FileComparison` per template-side path
/// plus one per working-copy-only path, ordered lexicographically by path so
/// downstream conflict resolution is deterministic.
pub fn compare_trees(
    template_files: &BTreeMap<String, Hash16>,
    local_files: &BTreeMap<String, Hash16>,
    manifest_files: &BTreeMap<String, TemplateFileEntry>,
) -> Vec<FileComparison> {
    let mut paths: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
    paths.extend(template_files.keys().map(String::as_str));
    paths.extend(local_files.keys().map(String::as_str));
    paths.extend(manifest_files.keys().map(String::as_str));

    paths
        .into_iter()
        .map(|path| {
            let template_hash = template_files.get(path);
            let local_hash = local_files.get(path);
            let manifest_entry = manifest_files.get(path);
            let state = classify(template_hash, local_hash, manifest_entry);

            let user_modified = state == ComparisonState::Conflict;
            let original_hash = if user_modified {
                manifest_entry.map(|e| e.hash.clone())
            } else {
                None
            };

            FileComparison {
                path: path.to_string(),
                state,
                template_hash: template_hash.cloned(),
                local_hash: local_hash.cloned(),
                manifest_hash: manifest_entry.map(|e| e.hash.clone()),
                user_modified,
                original_hash,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::hash_content;

    fn entry(hash: Hash16) -> TemplateFileEntry {
        TemplateFileEntry {
            hash,
            template_version: "v1".to_string(),
            user_modified: false,
            original_hash: None,
            last_synced_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn missing_local_is_new() {
        let t = hash_content("template");
        assert_eq!(classify(Some(&t), None, None), ComparisonState::New);
    }

    #[test]
    fn matching_hashes_are_identical_even_with_stale_manifest() {
        let t = hash_content("same");
        let stale = entry(hash_content("old"));
        assert_eq!(classify(Some(&t), Some(&t), Some(&stale)), ComparisonState::Identical);
    }

    #[test]
    fn manifest_matches_local_but_not_template_is_safe_update() {
        let a = hash_content("a");
        let b = hash_content("b");
        let manifest_entry = entry(a.clone());
        assert_eq!(
            classify(Some(&b), Some(&a), Some(&manifest_entry)),
            ComparisonState::SafeUpdate
        );
    }

    #[test]
    fn no_manifest_entry_and_local_differs_from_template_is_conflict() {
        let t = hash_content("template");
        let l = hash_content("local");
        assert_eq!(classify(Some(&t), Some(&l), None), ComparisonState::Conflict);
    }

    #[test]
    fn manifest_present_but_local_diverged_since_last_sync_is_conflict() {
        let t = hash_content("template");
        let l = hash_content("local-edit");
        let manifest_entry = entry(hash_content("manifest-hash"));
        assert_eq!(
            classify(Some(&t), Some(&l), Some(&manifest_entry)),
            ComparisonState::Conflict
        );
    }

    #[test]
    fn local_only_with_no_manifest_knowledge_is_user_only() {
        let l = hash_content("local");
        assert_eq!(classify(None, Some(&l), None), ComparisonState::UserOnly);
    }

    #[test]
    fn local_only_known_to_prior_manifest_is_deleted() {
        let l = hash_content("local");
        let manifest_entry = entry(hash_content("was-here"));
        assert_eq!(classify(None, Some(&l), Some(&manifest_entry)), ComparisonState::Deleted);
    }

    #[test]
    fn compare_trees_marks_conflicts_user_modified_with_original_hash() {
        let mut template = BTreeMap::new();
        template.insert("a.md".to_string(), hash_content("template"));
        let mut local = BTreeMap::new();
        local.insert("a.md".to_string(), hash_content("local"));
        let mut manifest = BTreeMap::new();
        manifest.insert("a.md".to_string(), entry(hash_content("manifest")));

        let rows = compare_trees(&template, &local, &manifest);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state, ComparisonState::Conflict);
        assert!(rows[0].user_modified);
        assert_eq!(rows[0].original_hash, Some(hash_content("manifest")));
    }

    #[test]
    fn compare_trees_is_ordered_lexicographically() {
        let mut template = BTreeMap::new();
        template.insert("z.md".to_string(), hash_content("z"));
        template.insert("a.md".to_string(), hash_content("a"));
        let rows = compare_trees(&template, &BTreeMap::new(), &BTreeMap::new());
        let paths: Vec<&str> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "z.md"]);
    }
}
