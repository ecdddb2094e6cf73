//! Template Manifest Manager (§4.5): the source-of-truth record of what the
//! template tree was at the last successful sync, mirrored in two places —
//! the ICS row (`core::store::Store::get_template_manifest`) and the
//! human-readable `.claude/.k0ntext-manifest.json` — with a deterministic
//! reconciliation rule between them.

use crate::core::error::KontextError;
use crate::core::hash::Hash16;
use crate::core::model::{TemplateFileEntry, TemplateManifest};
use crate::core::store::Store;
use std::path::Path;

/// Which side a manifest was loaded from or should be saved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Store,
    File,
}

/// Read the on-disk JSON mirror. `Ok(None)` if the file doesn't exist.
/// `Err(InvalidData)` if it exists but is missing a required top-level key
/// or `files` isn't an object — callers fall back to an empty manifest
/// rather than attempting to silently repair a corrupt one.
pub fn load_from_file(path: &Path) -> Result<Option<TemplateManifest>, KontextError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| KontextError::InvalidData(format!("malformed manifest JSON: {e}")))?;
    validate_required_keys(&value)?;
    let manifest: TemplateManifest = serde_json::from_value(value)
        .map_err(|e| KontextError::InvalidData(format!("manifest does not match schema: {e}")))?;
    Ok(Some(manifest))
}

fn validate_required_keys(value: &serde_json::Value) -> Result<(), KontextError> {
    let obj = value
        .as_object()
        .ok_or_else(|| KontextError::InvalidData("manifest root is not a JSON object".to_string()))?;
    for key in ["k0ntextVersion", "templateVersion", "createdAt"] {
        if !obj.contains_key(key) {
            return Err(KontextError::InvalidData(format!("manifest missing required key {key:?}")));
        }
    }
    match obj.get("files") {
        Some(serde_json::Value::Object(_)) => Ok(()),
        Some(_) => Err(KontextError::InvalidData("manifest 'files' is not an object".to_string())),
        None => Err(KontextError::InvalidData("manifest missing required key \"files\"".to_string())),
    }
}

/// Read the ICS row. `Ok(None)` if the store has never held a manifest.
pub fn load_from_store(store: &Store) -> Result<Option<TemplateManifest>, KontextError> {
    store.get_template_manifest()
}

/// Load whichever side is more recently updated (`updatedAt`, falling back
/// to `createdAt`, compared lexicographically as ISO-8601 strings), then
/// write that winner back into the losing side so both match afterward. If
/// only one side has a manifest, that one wins outright and is copied into
/// the empty side. If neither exists, a fresh empty manifest is returned
/// (not persisted — the caller decides when to first save it).
pub fn load_reconciled(
    store: &Store,
    file_path: &Path,
    k0ntext_version: &str,
) -> Result<TemplateManifest, KontextError> {
    let from_store = match load_from_store(store) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "manifest row in store was invalid, treating as absent");
            None
        }
    };
    let from_file = match load_from_file(file_path) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, path = %file_path.display(), "manifest file was invalid, treating as absent");
            None
        }
    };

    let winner = match (from_store, from_file) {
        (Some(s), Some(f)) => {
            if sort_key(&s) >= sort_key(&f) {
                save(&s, store, file_path, Source::File)?;
                s
            } else {
                save(&f, store, file_path, Source::Store)?;
                f
            }
        }
        (Some(s), None) => {
            save(&s, store, file_path, Source::File)?;
            s
        }
        (None, Some(f)) => {
            save(&f, store, file_path, Source::Store)?;
            f
        }
        (None, None) => TemplateManifest::new(k0ntext_version, "0"),
    };

    Ok(winner)
}

fn sort_key(m: &TemplateManifest) -> &str {
    if m.updated_at.is_empty() { &m.created_at } else { &m.updated_at }
}

/// Persist `manifest` into exactly one side, named by `source`.
pub fn save(
    manifest: &TemplateManifest,
    store: &Store,
    file_path: &Path,
    source: Source,
) -> Result<(), KontextError> {
    match source {
        Source::Store => store.put_template_manifest(manifest),
        Source::File => {
            if let Some(parent) = file_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(manifest)
                .map_err(|e| KontextError::InvalidData(e.to_string()))?;
            std::fs::write(file_path, json)?;
            Ok(())
        }
    }
}

/// Persist to both sides atomically-enough: the file write happens first
/// (cheap, local); if the store write then fails, the file is rolled back
/// to its prior bytes so neither side observes a half-applied manifest.
pub fn save_both(manifest: &TemplateManifest, store: &Store, file_path: &Path) -> Result<(), KontextError> {
    let prior_file_bytes = std::fs::read(file_path).ok();
    save(manifest, store, file_path, Source::File)?;
    if let Err(e) = save(manifest, store, file_path, Source::Store) {
        if let Some(prior) = prior_file_bytes {
            let _ = std::fs::write(file_path, prior);
        } else {
            let _ = std::fs::remove_file(file_path);
        }
        return Err(e);
    }
    Ok(())
}

/// Marks `path` as user-modified, recording the hash it was derived from.
/// `originalHash` must always be set whenever `userModified` flips true.
pub fn mark_user_modified(manifest: &mut TemplateManifest, path: &str, original_hash: Hash16) {
    manifest
        .files
        .entry(path.to_string())
        .and_modify(|e| {
            e.user_modified = true;
            e.original_hash = Some(original_hash.clone());
        })
        .or_insert_with(|| TemplateFileEntry {
            hash: original_hash.clone(),
            template_version: manifest.template_version.clone(),
            user_modified: true,
            original_hash: Some(original_hash),
            last_synced_at: crate::core::time::now_rfc3339(),
        });
    manifest.updated_at = crate::core::time::now_rfc3339();
}

/// Replace (or insert) an entry wholesale.
pub fn update_entry(manifest: &mut TemplateManifest, path: &str, entry: TemplateFileEntry) {
    manifest.files.insert(path.to_string(), entry);
    manifest.updated_at = crate::core::time::now_rfc3339();
}

pub fn remove_entry(manifest: &mut TemplateManifest, path: &str) {
    if manifest.files.remove(path).is_some() {
        manifest.updated_at = crate::core::time::now_rfc3339();
    }
}

pub fn get_user_modified_paths(manifest: &TemplateManifest) -> Vec<String> {
    manifest
        .files
        .iter()
        .filter(|(_, e)| e.user_modified)
        .map(|(path, _)| path.clone())
        .collect()
}

/// True if the manifest's recorded template version differs from
/// `current_version` — a version bump alone (before any content comparison)
/// is enough to say a sync is due.
pub fn needs_update(manifest: &TemplateManifest, current_version: &str) -> bool {
    manifest.template_version != current_version
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::hash_content;
    use tempfile::tempdir;

    fn store(dir: &Path) -> Store {
        Store::new(dir, dir.join(".k0ntext.db"), 5)
    }

    #[test]
    fn load_from_file_returns_none_when_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        assert!(load_from_file(&path).unwrap().is_none());
    }

    #[test]
    fn load_from_file_rejects_missing_required_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, r#"{"templateVersion": "1", "createdAt": "x", "files": {}}"#).unwrap();
        let err = load_from_file(&path).unwrap_err();
        assert!(matches!(err, KontextError::InvalidData(_)));
    }

    #[test]
    fn load_from_file_rejects_non_object_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(
            &path,
            r#"{"k0ntextVersion":"0.1","templateVersion":"1","createdAt":"x","files":[]}"#,
        )
        .unwrap();
        let err = load_from_file(&path).unwrap_err();
        assert!(matches!(err, KontextError::InvalidData(_)));
    }

    #[test]
    fn load_from_file_preserves_unknown_top_level_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(
            &path,
            r#"{"k0ntextVersion":"0.1","templateVersion":"1","createdAt":"x","updatedAt":"x","files":{},"future_field":"kept"}"#,
        )
        .unwrap();
        let manifest = load_from_file(&path).unwrap().unwrap();
        assert_eq!(
            manifest.extra.get("future_field").and_then(|v| v.as_str()),
            Some("kept")
        );
    }

    #[test]
    fn load_reconciled_prefers_later_updated_at_and_rewrites_loser() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());
        let file_path = dir.path().join("manifest.json");

        let mut in_store = TemplateManifest::new("0.1.0", "2026.1");
        in_store.updated_at = "2025-01-02T00:00:00Z".to_string();
        s.put_template_manifest(&in_store).unwrap();

        let mut in_file = TemplateManifest::new("0.1.0", "2026.0");
        in_file.updated_at = "2025-01-01T00:00:00Z".to_string();
        save(&in_file, &s, &file_path, Source::File).unwrap();

        let reconciled = load_reconciled(&s, &file_path, "0.1.0").unwrap();
        assert_eq!(reconciled.template_version, "2026.1");

        let rewritten_file = load_from_file(&file_path).unwrap().unwrap();
        assert_eq!(rewritten_file.template_version, "2026.1");
    }

    #[test]
    fn load_reconciled_with_neither_side_returns_fresh_empty_manifest() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());
        let file_path = dir.path().join("manifest.json");
        let reconciled = load_reconciled(&s, &file_path, "0.1.0").unwrap();
        assert!(reconciled.files.is_empty());
    }

    #[test]
    fn mark_user_modified_sets_original_hash() {
        let mut manifest = TemplateManifest::new("0.1.0", "2026.1");
        update_entry(
            &mut manifest,
            "agents/x.md",
            TemplateFileEntry {
                hash: hash_content("a"),
                template_version: "2026.1".to_string(),
                user_modified: false,
                original_hash: None,
                last_synced_at: crate::core::time::now_rfc3339(),
            },
        );
        mark_user_modified(&mut manifest, "agents/x.md", hash_content("a"));
        let entry = &manifest.files["agents/x.md"];
        assert!(entry.user_modified);
        assert_eq!(entry.original_hash, Some(hash_content("a")));
    }

    #[test]
    fn get_user_modified_paths_filters_correctly() {
        let mut manifest = TemplateManifest::new("0.1.0", "2026.1");
        update_entry(
            &mut manifest,
            "a.md",
            TemplateFileEntry {
                hash: hash_content("a"),
                template_version: "2026.1".to_string(),
                user_modified: true,
                original_hash: Some(hash_content("a0")),
                last_synced_at: crate::core::time::now_rfc3339(),
            },
        );
        update_entry(
            &mut manifest,
            "b.md",
            TemplateFileEntry {
                hash: hash_content("b"),
                template_version: "2026.1".to_string(),
                user_modified: false,
                original_hash: None,
                last_synced_at: crate::core::time::now_rfc3339(),
            },
        );
        assert_eq!(get_user_modified_paths(&manifest), vec!["a.md".to_string()]);
    }

    #[test]
    fn needs_update_compares_template_version() {
        let manifest = TemplateManifest::new("0.1.0", "2026.1");
        assert!(needs_update(&manifest, "2026.2"));
        assert!(!needs_update(&manifest, "2026.1"));
    }

    #[test]
    fn remove_entry_drops_path() {
        let mut manifest = TemplateManifest::new("0.1.0", "2026.1");
        update_entry(
            &mut manifest,
            "a.md",
            TemplateFileEntry {
                hash: hash_content("a"),
                template_version: "2026.1".to_string(),
                user_modified: false,
                original_hash: None,
                last_synced_at: crate::core::time::now_rfc3339(),
            },
        );
        remove_entry(&mut manifest, "a.md");
        assert!(!manifest.files.contains_key("a.md"));
    }
}
