//! Persistent data model for the Indexed Content Store: `ContextItem`,
//! `Embedding`, `GeneratedFile`, `FileTimestamp`, `TemplateManifest`,
//! `TemplateFileEntry`. `serde_json::Value` is deliberately confined to
//! `MetadataValue` and the manifest's `extra` bag — nothing else in the
//! public API takes or returns untyped JSON.

use crate::core::hash::Hash16;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Docs/configs may hold up to 50 000 bytes of content, code up to 20 000;
/// content over the cap is truncated.
pub const DOC_CONTENT_CAP: usize = 50_000;
pub const CODE_CONTENT_CAP: usize = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Doc,
    Code,
    ToolConfig,
    Workflow,
    Config,
    Pattern,
    TemplateFile,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Doc => "doc",
            ItemType::Code => "code",
            ItemType::ToolConfig => "tool_config",
            ItemType::Workflow => "workflow",
            ItemType::Config => "config",
            ItemType::Pattern => "pattern",
            ItemType::TemplateFile => "template_file",
        }
    }

    pub fn content_cap(&self) -> usize {
        match self {
            ItemType::Code => CODE_CONTENT_CAP,
            _ => DOC_CONTENT_CAP,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "doc" => ItemType::Doc,
            "code" => ItemType::Code,
            "tool_config" => ItemType::ToolConfig,
            "workflow" => ItemType::Workflow,
            "config" => ItemType::Config,
            "pattern" => ItemType::Pattern,
            "template_file" => ItemType::TemplateFile,
            _ => return None,
        })
    }
}

/// A tagged union for opaque per-item metadata, so the JSON manifest/audit
/// boundary round-trips exactly without internal code handling raw
/// `serde_json::Value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Number(f64),
    Bool(bool),
    Array(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
    Null,
}

pub type Metadata = BTreeMap<String, MetadataValue>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub id: String,
    pub item_type: ItemType,
    pub name: String,
    pub content: String,
    pub file_path: Option<String>,
    pub metadata: Metadata,
    pub content_hash: Hash16,
    pub created_at: String,
    pub updated_at: String,
}

/// Deterministic id derived from the item's uniqueness key, so re-indexing
/// the same `(type, name, filePath)` always resolves to the same row.
pub fn item_id(item_type: ItemType, name: &str, file_path: Option<&str>) -> String {
    let key = format!("{}\u{1}{}\u{1}{}", item_type.as_str(), name, file_path.unwrap_or(""));
    crate::core::hash::hash_content(&key).to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub item_id: String,
    pub dim: usize,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub tool: String,
    pub file_path: String,
    pub content_hash: Hash16,
    pub backup_path: Option<String>,
    pub metadata: Metadata,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTimestamp {
    pub path: String,
    pub mtime: String,
    pub size: u64,
    pub hash: Hash16,
    pub last_checked_at: String,
    pub git_commit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub tool: String,
    pub version: String,
    pub user_modified: bool,
    pub last_checked: String,
    pub file_path: Option<String>,
    pub content_hash: Option<Hash16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateFileEntry {
    pub hash: Hash16,
    pub template_version: String,
    pub user_modified: bool,
    pub original_hash: Option<Hash16>,
    pub last_synced_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateManifest {
    pub k0ntext_version: String,
    pub template_version: String,
    pub created_at: String,
    pub updated_at: String,
    /// Always `"posix"` for manifests this crate writes; see `core::path`.
    #[serde(default = "default_normalization")]
    pub content_normalization: String,
    pub files: BTreeMap<String, TemplateFileEntry>,
    /// Unknown top-level keys from a manifest written by another producer,
    /// preserved byte-for-byte across load/save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_normalization() -> String {
    "posix".to_string()
}

impl TemplateManifest {
    pub fn new(k0ntext_version: impl Into<String>, template_version: impl Into<String>) -> Self {
        let now = crate::core::time::now_rfc3339();
        Self {
            k0ntext_version: k0ntext_version.into(),
            template_version: template_version.into(),
            created_at: now.clone(),
            updated_at: now,
            content_normalization: default_normalization(),
            files: BTreeMap::new(),
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_is_deterministic() {
        let a = item_id(ItemType::Doc, "guide", Some("docs/guide.md"));
        let b = item_id(ItemType::Doc, "guide", Some("docs/guide.md"));
        assert_eq!(a, b);
    }

    #[test]
    fn item_id_distinguishes_type() {
        let doc = item_id(ItemType::Doc, "x", None);
        let code = item_id(ItemType::Code, "x", None);
        assert_ne!(doc, code);
    }

    #[test]
    fn item_type_round_trips_through_str() {
        for t in [
            ItemType::Doc,
            ItemType::Code,
            ItemType::ToolConfig,
            ItemType::Workflow,
            ItemType::Config,
            ItemType::Pattern,
            ItemType::TemplateFile,
        ] {
            assert_eq!(ItemType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn manifest_defaults_to_posix_normalization() {
        let m = TemplateManifest::new("0.1.0", "2026.1");
        assert_eq!(m.content_normalization, "posix");
        assert!(m.files.is_empty());
    }
}
