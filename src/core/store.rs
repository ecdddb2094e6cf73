//! Indexed Content Store: the transactional record of every `ContextItem`,
//! its embedding, generated-file provenance, file timestamps, sync state,
//! and the template manifest row.
//!
//! Every public method here goes through `StoreBroker::with_conn`, so writers
//! are serialized per-database and every multi-row write commits atomically.

use crate::core::broker::StoreBroker;
use crate::core::error::KontextError;
use crate::core::hash::{Hash16, hash_content};
use crate::core::model::{
    ContextItem, FileTimestamp, GeneratedFile, Metadata, SyncState, TemplateManifest, item_id,
};
use crate::core::time::now_rfc3339;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};

pub struct Store {
    broker: StoreBroker,
    db_path: PathBuf,
}

/// How an embedding-dimension change is carried out when the store's
/// configured dimension no longer matches what's being stored.
pub enum DimensionMigration {
    /// Delete every stored embedding and adopt the new dimension.
    DropAll,
    /// Re-embed every item through an external embedder. Not implemented:
    /// the embedder is an out-of-scope collaborator (`core::ambient::Embedder`).
    /// Kept as a variant so callers can match on it without a breaking change
    /// once re-embedding support lands.
    ReembedViaCallback(#[allow(dead_code)] fn(&str) -> Result<Vec<f32>, KontextError>),
}

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HybridSearchOptions {
    pub limit: usize,
    pub item_type: Option<String>,
    pub text_weight: f32,
    pub vector_weight: f32,
}

impl Store {
    pub fn new(project_root: &Path, db_path: PathBuf, writer_lock_timeout_secs: u64) -> Self {
        Self {
            broker: StoreBroker::new(project_root, writer_lock_timeout_secs),
            db_path,
        }
    }

    /// Opts this store into applying breaking schema migrations automatically
    /// instead of refusing them with `InvalidData`.
    pub fn allow_breaking_migrations(mut self) -> Self {
        self.broker = self.broker.allow_breaking_migrations();
        self
    }

    fn with_conn<F, R>(&self, op: &str, f: F) -> Result<R, KontextError>
    where
        F: FnOnce(&Connection) -> Result<R, KontextError>,
    {
        self.broker.with_conn(&self.db_path, op, f)
    }

    /// Insert or replace by `(type, name, filePath)`; recomputes `contentHash`
    /// and invalidates the associated embedding when the hash changed.
    pub fn upsert_item(
        &self,
        item_type: crate::core::model::ItemType,
        name: &str,
        file_path: Option<&str>,
        content: &str,
        metadata: Metadata,
    ) -> Result<ContextItem, KontextError> {
        let file_path = file_path.map(crate::core::path::normalize);
        if item_type == crate::core::model::ItemType::TemplateFile {
            let fp = file_path.as_deref().unwrap_or("");
            if !fp.starts_with(".claude/") {
                return Err(KontextError::InvalidData(format!(
                    "template_file items must live under .claude/, got {fp:?}"
                )));
            }
        }

        let cap = item_type.content_cap();
        let content: String = if content.len() > cap {
            content.chars().take(cap).collect()
        } else {
            content.to_string()
        };

        let id = item_id(item_type, name, file_path.as_deref());
        let content_hash = hash_content(&content);
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| KontextError::InvalidData(e.to_string()))?;
        let now = now_rfc3339();

        self.with_conn("store.upsert_item", |conn| {
            let prior_hash: Option<String> = conn
                .query_row(
                    "SELECT content_hash FROM items WHERE id = ?1",
                    params![id],
                    |r| r.get(0),
                )
                .optional()?;

            let created_at = conn
                .query_row(
                    "SELECT created_at FROM items WHERE id = ?1",
                    params![id],
                    |r| r.get::<_, String>(0),
                )
                .optional()?
                .unwrap_or_else(|| now.clone());

            conn.execute(
                "INSERT INTO items (id, type, name, content, file_path, metadata, content_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(type, name, file_path) DO UPDATE SET
                    content = excluded.content,
                    metadata = excluded.metadata,
                    content_hash = excluded.content_hash,
                    updated_at = excluded.updated_at",
                params![
                    id,
                    item_type.as_str(),
                    name,
                    content,
                    file_path,
                    metadata_json,
                    content_hash.as_str(),
                    created_at,
                    now,
                ],
            )?;

            if prior_hash.as_deref() != Some(content_hash.as_str()) {
                conn.execute("DELETE FROM embeddings WHERE item_id = ?1", params![id])?;
            }

            Ok(ContextItem {
                id: id.clone(),
                item_type,
                name: name.to_string(),
                content,
                file_path,
                metadata,
                content_hash,
                created_at,
                updated_at: now.clone(),
            })
        })
    }

    pub fn get_items_by_type(
        &self,
        item_type: crate::core::model::ItemType,
    ) -> Result<Vec<ContextItem>, KontextError> {
        self.with_conn("store.get_items_by_type", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, type, name, content, file_path, metadata, content_hash, created_at, updated_at
                 FROM items WHERE type = ?1 ORDER BY updated_at DESC",
            )?;
            let rows = stmt
                .query_map(params![item_type.as_str()], row_to_item)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_all_items(&self) -> Result<Vec<ContextItem>, KontextError> {
        self.with_conn("store.get_all_items", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, type, name, content, file_path, metadata, content_hash, created_at, updated_at
                 FROM items ORDER BY updated_at DESC",
            )?;
            let rows = stmt.query_map([], row_to_item)?.collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_item_by_file(&self, file_path: &str) -> Result<Option<ContextItem>, KontextError> {
        let file_path = crate::core::path::normalize(file_path);
        self.with_conn("store.get_item_by_file", |conn| {
            conn.query_row(
                "SELECT id, type, name, content, file_path, metadata, content_hash, created_at, updated_at
                 FROM items WHERE file_path = ?1",
                params![file_path],
                row_to_item,
            )
            .optional()
            .map_err(KontextError::from)
        })
    }

    /// Substring match over `name` and `content`, ordered by relevance
    /// (occurrence count) then recency.
    pub fn search_text(
        &self,
        query: &str,
        item_type: Option<crate::core::model::ItemType>,
    ) -> Result<Vec<ContextItem>, KontextError> {
        let needle = query.to_lowercase();
        let type_filter = item_type.map(|t| t.as_str().to_string());
        self.with_conn("store.search_text", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, type, name, content, file_path, metadata, content_hash, created_at, updated_at
                 FROM items WHERE type = COALESCE(?1, type)",
            )?;
            let mut items = stmt
                .query_map(params![type_filter], row_to_item)?
                .collect::<Result<Vec<_>, _>>()?;
            items.retain(|i| {
                i.name.to_lowercase().contains(&needle) || i.content.to_lowercase().contains(&needle)
            });
            items.sort_by(|a, b| {
                let score = |i: &ContextItem| {
                    i.name.to_lowercase().matches(&needle).count() * 3
                        + i.content.to_lowercase().matches(&needle).count()
                };
                score(b).cmp(&score(a)).then_with(|| b.updated_at.cmp(&a.updated_at))
            });
            Ok(items)
        })
    }

    /// Rejects a vector whose dimension disagrees with the store's
    /// configured dimension unless `force` is set.
    pub fn store_embedding(
        &self,
        item_id: &str,
        vector: &[f32],
        configured_dim: usize,
        force: bool,
    ) -> Result<(), KontextError> {
        if !force && vector.len() != configured_dim {
            return Err(KontextError::InvalidData(format!(
                "embedding dimension {} does not match configured dimension {}",
                vector.len(),
                configured_dim
            )));
        }
        let blob = f32_vec_to_le_bytes(vector);
        self.with_conn("store.store_embedding", |conn| {
            conn.execute(
                "INSERT INTO embeddings (item_id, dim, vector) VALUES (?1, ?2, ?3)
                 ON CONFLICT(item_id) DO UPDATE SET dim = excluded.dim, vector = excluded.vector",
                params![item_id, vector.len() as i64, blob],
            )?;
            Ok(())
        })
    }

    /// Drops every stored embedding (the only implemented migration mode;
    /// see `DimensionMigration`).
    pub fn reconfigure_embedding_dimension(
        &self,
        mode: DimensionMigration,
    ) -> Result<(), KontextError> {
        match mode {
            DimensionMigration::DropAll => self.with_conn("store.reconfigure_embedding_dimension", |conn| {
                conn.execute("DELETE FROM embeddings", [])?;
                Ok(())
            }),
            DimensionMigration::ReembedViaCallback(_) => Err(KontextError::InvalidData(
                "re-embed-via-callback migration is not implemented".to_string(),
            )),
        }
    }

    pub fn search_by_embedding(
        &self,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<(ContextItem, f32)>, KontextError> {
        self.with_conn("store.search_by_embedding", |conn| {
            let mut stmt = conn.prepare(
                "SELECT i.id, i.type, i.name, i.content, i.file_path, i.metadata, i.content_hash,
                        i.created_at, i.updated_at, e.vector
                 FROM items i JOIN embeddings e ON e.item_id = i.id",
            )?;
            let mut scored: Vec<(ContextItem, f32)> = stmt
                .query_map([], |row| {
                    let item = row_to_item(row)?;
                    let blob: Vec<u8> = row.get(9)?;
                    Ok((item, le_bytes_to_f32_vec(&blob)))
                })?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .map(|(item, vec)| (item, cosine_similarity(query_vec, &vec)))
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(k);
            Ok(scored)
        })
    }

    /// Combines normalized text relevance with cosine similarity. With no
    /// `query_vec`, degrades to text-only ranking.
    pub fn hybrid_search(
        &self,
        query_text: &str,
        query_vec: Option<&[f32]>,
        options: HybridSearchOptions,
    ) -> Result<Vec<ContextItem>, KontextError> {
        let item_type = options
            .item_type
            .as_deref()
            .and_then(crate::core::model::ItemType::parse);
        let text_hits = self.search_text(query_text, item_type)?;

        let Some(qvec) = query_vec else {
            return Ok(text_hits.into_iter().take(options.limit).collect());
        };

        let by_embedding = self.search_by_embedding(qvec, usize::MAX)?;
        let vector_scores: std::collections::HashMap<String, f32> =
            by_embedding.into_iter().map(|(item, score)| (item.id, score)).collect();

        let max_text_score = text_hits.len().max(1) as f32;
        let mut combined: Vec<(ContextItem, f32)> = text_hits
            .into_iter()
            .enumerate()
            .map(|(rank, item)| {
                let text_score = 1.0 - (rank as f32 / max_text_score);
                let vector_score = vector_scores.get(&item.id).copied().unwrap_or(0.0);
                let score = options.text_weight * text_score + options.vector_weight * vector_score;
                (item, score)
            })
            .collect();
        combined.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.updated_at.cmp(&a.0.updated_at))
        });
        Ok(combined.into_iter().take(options.limit).map(|(item, _)| item).collect())
    }

    pub fn upsert_generated_file(
        &self,
        tool: &str,
        file_path: &str,
        content_hash: &Hash16,
        backup_path: Option<&str>,
        metadata: Metadata,
    ) -> Result<(), KontextError> {
        let file_path = crate::core::path::normalize(file_path);
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| KontextError::InvalidData(e.to_string()))?;
        let now = now_rfc3339();
        self.with_conn("store.upsert_generated_file", |conn| {
            conn.execute(
                "INSERT INTO generated_files (tool, file_path, content_hash, backup_path, metadata, generated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(tool, file_path) DO UPDATE SET
                    content_hash = excluded.content_hash,
                    backup_path = excluded.backup_path,
                    metadata = excluded.metadata,
                    generated_at = excluded.generated_at",
                params![tool, file_path, content_hash.as_str(), backup_path, metadata_json, now],
            )?;
            Ok(())
        })
    }

    pub fn get_generated_files(&self, tool: Option<&str>) -> Result<Vec<GeneratedFile>, KontextError> {
        let tool = tool.map(str::to_string);
        self.with_conn("store.get_generated_files", |conn| {
            let mut stmt = conn.prepare(
                "SELECT tool, file_path, content_hash, backup_path, metadata, generated_at
                 FROM generated_files WHERE tool = COALESCE(?1, tool) ORDER BY generated_at DESC",
            )?;
            let rows = stmt
                .query_map(params![tool], |row| {
                    let hash: String = row.get(2)?;
                    let metadata_json: String = row.get(4)?;
                    Ok(GeneratedFile {
                        tool: row.get(0)?,
                        file_path: row.get(1)?,
                        content_hash: Hash16::parse(&hash).unwrap_or_else(Hash16::empty),
                        backup_path: row.get(3)?,
                        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
                        generated_at: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_version_tracking(
        &self,
        tool: &str,
        version: &str,
        user_modified: bool,
        last_checked: &str,
        file_path: Option<&str>,
        content_hash: Option<&Hash16>,
    ) -> Result<(), KontextError> {
        let file_path = file_path.map(crate::core::path::normalize);
        let hash_str = content_hash.map(|h| h.as_str().to_string());
        self.with_conn("store.update_version_tracking", |conn| {
            conn.execute(
                "INSERT INTO sync_state (tool, version, user_modified, last_checked, file_path, content_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(tool) DO UPDATE SET
                    version = excluded.version,
                    user_modified = excluded.user_modified,
                    last_checked = excluded.last_checked,
                    file_path = excluded.file_path,
                    content_hash = excluded.content_hash",
                params![tool, version, user_modified as i64, last_checked, file_path, hash_str],
            )?;
            Ok(())
        })
    }

    pub fn get_sync_state(&self, tool: &str) -> Result<Option<SyncState>, KontextError> {
        self.with_conn("store.get_sync_state", |conn| {
            conn.query_row(
                "SELECT tool, version, user_modified, last_checked, file_path, content_hash
                 FROM sync_state WHERE tool = ?1",
                params![tool],
                |row| {
                    let hash: Option<String> = row.get(5)?;
                    Ok(SyncState {
                        tool: row.get(0)?,
                        version: row.get(1)?,
                        user_modified: row.get::<_, i64>(2)? != 0,
                        last_checked: row.get(3)?,
                        file_path: row.get(4)?,
                        content_hash: hash.and_then(|h| Hash16::parse(&h)),
                    })
                },
            )
            .optional()
            .map_err(KontextError::from)
        })
    }

    pub fn record_file_timestamp(&self, ts: &FileTimestamp) -> Result<(), KontextError> {
        let path = crate::core::path::normalize(&ts.path);
        self.with_conn("store.record_file_timestamp", |conn| {
            conn.execute(
                "INSERT INTO file_timestamps (path, mtime, size, hash, last_checked_at, git_commit)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(path) DO UPDATE SET
                    mtime = excluded.mtime,
                    size = excluded.size,
                    hash = excluded.hash,
                    last_checked_at = excluded.last_checked_at,
                    git_commit = excluded.git_commit",
                params![
                    path,
                    ts.mtime,
                    ts.size as i64,
                    ts.hash.as_str(),
                    ts.last_checked_at,
                    ts.git_commit,
                ],
            )?;
            Ok(())
        })
    }

    /// The staleness signal: true iff `hash` differs from what's on record
    /// for `path`, or the path has never been checked. Distinct from
    /// documentation drift (`drift::detector`), which is about reference
    /// validity rather than content change.
    pub fn has_content_changed(&self, path: &str, hash: &Hash16) -> Result<bool, KontextError> {
        let path = crate::core::path::normalize(path);
        self.with_conn("store.has_content_changed", |conn| {
            let prior: Option<String> = conn
                .query_row(
                    "SELECT hash FROM file_timestamps WHERE path = ?1",
                    params![path],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(prior.as_deref() != Some(hash.as_str()))
        })
    }

    /// The single-row template manifest, as last saved by
    /// `template::manifest::save`. `None` if the store has never held one.
    pub fn get_template_manifest(&self) -> Result<Option<TemplateManifest>, KontextError> {
        self.with_conn("store.get_template_manifest", |conn| {
            let row: Option<(String, String, String, String, String, String, String)> = conn
                .query_row(
                    "SELECT k0ntext_version, template_version, created_at, updated_at,
                            content_normalization, files, extra
                     FROM template_manifest WHERE id = 1",
                    [],
                    |r| {
                        Ok((
                            r.get(0)?,
                            r.get(1)?,
                            r.get(2)?,
                            r.get(3)?,
                            r.get(4)?,
                            r.get(5)?,
                            r.get(6)?,
                        ))
                    },
                )
                .optional()?;

            let Some((k0ntext_version, template_version, created_at, updated_at, content_normalization, files_json, extra_json)) = row
            else {
                return Ok(None);
            };

            let files = serde_json::from_str(&files_json)
                .map_err(|e| KontextError::InvalidData(format!("corrupt manifest files column: {e}")))?;
            let extra = serde_json::from_str(&extra_json).unwrap_or_default();

            Ok(Some(TemplateManifest {
                k0ntext_version,
                template_version,
                created_at,
                updated_at,
                content_normalization,
                files,
                extra,
            }))
        })
    }

    /// Replaces the single manifest row wholesale. The manifest is a
    /// singleton (`id = 1`) — there is exactly one template manifest per
    /// project store.
    pub fn put_template_manifest(&self, manifest: &TemplateManifest) -> Result<(), KontextError> {
        let files_json = serde_json::to_string(&manifest.files)
            .map_err(|e| KontextError::InvalidData(e.to_string()))?;
        let extra_json = serde_json::to_string(&manifest.extra)
            .map_err(|e| KontextError::InvalidData(e.to_string()))?;
        self.with_conn("store.put_template_manifest", |conn| {
            conn.execute(
                "INSERT INTO template_manifest
                    (id, k0ntext_version, template_version, created_at, updated_at, content_normalization, files, extra)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    k0ntext_version = excluded.k0ntext_version,
                    template_version = excluded.template_version,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at,
                    content_normalization = excluded.content_normalization,
                    files = excluded.files,
                    extra = excluded.extra",
                params![
                    manifest.k0ntext_version,
                    manifest.template_version,
                    manifest.created_at,
                    manifest.updated_at,
                    manifest.content_normalization,
                    files_json,
                    extra_json,
                ],
            )?;
            Ok(())
        })
    }

    pub fn health_check(&self) -> HealthStatus {
        let result = self.with_conn("store.health_check", |conn| {
            let version: Option<i64> = conn
                .query_row("SELECT version FROM schema_meta ORDER BY version DESC LIMIT 1", [], |r| {
                    r.get(0)
                })
                .optional()?;
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(version)
        });
        match result {
            Ok(_) => HealthStatus { healthy: true, error: None },
            Err(e) => HealthStatus { healthy: false, error: Some(e.to_string()) },
        }
    }
}

fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<ContextItem> {
    let type_str: String = row.get(1)?;
    let metadata_json: String = row.get(5)?;
    let hash_str: String = row.get(6)?;
    Ok(ContextItem {
        id: row.get(0)?,
        item_type: crate::core::model::ItemType::parse(&type_str)
            .unwrap_or(crate::core::model::ItemType::Doc),
        name: row.get(2)?,
        content: row.get(3)?,
        file_path: row.get(4)?,
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        content_hash: Hash16::parse(&hash_str).unwrap_or_else(Hash16::empty),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn f32_vec_to_le_bytes(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn le_bytes_to_f32_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
