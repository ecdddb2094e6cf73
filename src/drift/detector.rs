//! Drift Detector (C7): extracts a document's references, validates each
//! against the live tree, and rolls the result up into a health score.

use crate::core::error::KontextError;
use crate::extract::anchor;
use crate::extract::references::{Reference, extract_references};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DriftLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftStatus {
    Healthy,
    NeedsUpdate,
    Stale,
    Critical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriftIssue {
    pub reference: String,
    pub level: DriftLevel,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentDrift {
    pub doc_path: String,
    pub issues: Vec<DriftIssue>,
    pub health_score: u32,
    pub status: DriftStatus,
}

/// The maximum level present, or `None` if `issues` is empty.
pub fn calculate_drift_level(issues: &[DriftIssue]) -> DriftLevel {
    issues.iter().map(|i| i.level).max().unwrap_or(DriftLevel::None)
}

pub fn check_document(doc_path: &Path, project_root: &Path) -> Result<DocumentDrift, KontextError> {
    tracing::debug!(doc = %doc_path.display(), "checking document for drift");
    let content = std::fs::read_to_string(doc_path)?;
    let refs = extract_references(&content);
    let doc_dir = doc_path.parent().unwrap_or(project_root);

    let mut issues = Vec::new();
    let mut valid = 0usize;
    let total = refs.len();

    for r in &refs {
        match r {
            Reference::FileLine { path, line, end_line } => {
                let full = project_root.join(crate::core::path::normalize(path));
                if !full.exists() {
                    issues.push(DriftIssue {
                        reference: format!("{path}:{line}"),
                        level: DriftLevel::Critical,
                        message: format!("referenced file {path} does not exist"),
                        suggestion: find_similarly_named(project_root, path),
                    });
                    continue;
                }
                let line_count = std::fs::read_to_string(&full).map(|c| c.lines().count()).unwrap_or(0);
                let end = end_line.unwrap_or(*line);
                if *line > line_count || end > line_count {
                    issues.push(DriftIssue {
                        reference: format!("{path}:{line}"),
                        level: DriftLevel::High,
                        message: format!("line {line} is out of range for {path} ({line_count} lines)"),
                        suggestion: None,
                    });
                } else {
                    valid += 1;
                }
            }
            Reference::Anchor { path, symbol } => {
                let anchor_str = format!("{path}::{symbol}()");
                let resolution = anchor::resolve(&anchor_str, project_root);
                if resolution.ok {
                    valid += 1;
                } else {
                    let level = match resolution.reason.as_deref() {
                        Some("missing_file") => DriftLevel::Critical,
                        _ => DriftLevel::High,
                    };
                    issues.push(DriftIssue {
                        reference: anchor_str,
                        level,
                        message: resolution.reason.unwrap_or_default(),
                        suggestion: None,
                    });
                }
            }
            Reference::Directory { path } => {
                let full = project_root.join(crate::core::path::normalize(path));
                if full.is_dir() {
                    valid += 1;
                } else {
                    issues.push(DriftIssue {
                        reference: path.clone(),
                        level: DriftLevel::Medium,
                        message: if full.exists() {
                            format!("{path} exists but is not a directory")
                        } else {
                            format!("directory {path} does not exist")
                        },
                        suggestion: None,
                    });
                }
            }
            Reference::MarkdownLink { target } => {
                let stripped = crate::core::path::strip_fragment(target);
                let full = doc_dir.join(stripped);
                if full.exists() {
                    valid += 1;
                } else {
                    issues.push(DriftIssue {
                        reference: target.clone(),
                        level: DriftLevel::Medium,
                        message: format!("linked file {target} does not exist"),
                        suggestion: None,
                    });
                }
            }
            Reference::PlainFile { path } => {
                let full = project_root.join(crate::core::path::normalize(path));
                if full.exists() {
                    valid += 1;
                } else {
                    issues.push(DriftIssue {
                        reference: path.clone(),
                        level: DriftLevel::Critical,
                        message: format!("referenced file {path} does not exist"),
                        suggestion: find_similarly_named(project_root, path),
                    });
                }
            }
        }
    }

    let health_score = if total == 0 { 100 } else { ((100 * valid) as f64 / total as f64).round() as u32 };
    let level = calculate_drift_level(&issues);
    let status = match level {
        DriftLevel::Critical => DriftStatus::Critical,
        DriftLevel::High => DriftStatus::Stale,
        DriftLevel::Medium | DriftLevel::Low => DriftStatus::NeedsUpdate,
        DriftLevel::None => DriftStatus::Healthy,
    };
    if !issues.is_empty() {
        tracing::warn!(
            doc = %doc_path.display(),
            issues = issues.len(),
            health_score,
            ?status,
            "document references have drifted"
        );
    }

    Ok(DocumentDrift {
        doc_path: crate::core::path::normalize(&doc_path.to_string_lossy()),
        issues,
        health_score,
        status,
    })
}

fn find_similarly_named(project_root: &Path, missing: &str) -> Option<String> {
    let leaf = Path::new(missing).file_name()?.to_string_lossy().to_string();
    WalkDir::new(project_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name().to_string_lossy() == leaf)
        .map(|e| {
            let rel = e.path().strip_prefix(project_root).unwrap_or(e.path());
            crate::core::path::normalize(&rel.to_string_lossy())
        })
}

#[derive(Debug, Clone)]
pub struct DriftReport {
    pub documents: Vec<DocumentDrift>,
    pub healthy_count: usize,
    pub needs_update_count: usize,
    pub stale_count: usize,
    pub critical_count: usize,
    pub overall_health_score: f64,
}

/// Checks every document under `doc_paths` and aggregates into a report.
/// `overall_health_score` is the arithmetic mean of per-document scores
/// (100 if `doc_paths` is empty, matching the "no references" convention).
pub fn check_documents(doc_paths: &[PathBuf], project_root: &Path) -> Result<DriftReport, KontextError> {
    let documents = doc_paths
        .iter()
        .map(|p| check_document(p, project_root))
        .collect::<Result<Vec<_>, _>>()?;

    let mut report = DriftReport {
        healthy_count: 0,
        needs_update_count: 0,
        stale_count: 0,
        critical_count: 0,
        overall_health_score: 100.0,
        documents: Vec::new(),
    };

    for doc in &documents {
        match doc.status {
            DriftStatus::Healthy => report.healthy_count += 1,
            DriftStatus::NeedsUpdate => report.needs_update_count += 1,
            DriftStatus::Stale => report.stale_count += 1,
            DriftStatus::Critical => report.critical_count += 1,
        }
    }
    if !documents.is_empty() {
        report.overall_health_score =
            documents.iter().map(|d| d.health_score as f64).sum::<f64>() / documents.len() as f64;
    }
    tracing::info!(
        documents = documents.len(),
        healthy = report.healthy_count,
        needs_update = report.needs_update_count,
        stale = report.stale_count,
        critical = report.critical_count,
        overall_health_score = report.overall_health_score,
        "drift report complete"
    );
    report.documents = documents;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn document_with_no_references_is_fully_healthy() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("README.md");
        fs::write(&doc, "no references here").unwrap();
        let drift = check_document(&doc, dir.path()).unwrap();
        assert_eq!(drift.health_score, 100);
        assert_eq!(drift.status, DriftStatus::Healthy);
    }

    #[test]
    fn missing_referenced_file_is_critical() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("README.md");
        fs::write(&doc, "see `src/gone.rs`").unwrap();
        let drift = check_document(&doc, dir.path()).unwrap();
        assert_eq!(drift.status, DriftStatus::Critical);
        assert_eq!(drift.issues[0].level, DriftLevel::Critical);
    }

    #[test]
    fn out_of_range_line_reference_is_stale() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "fn one() {}\n").unwrap();
        let doc = dir.path().join("README.md");
        fs::write(&doc, "see src/lib.rs:99").unwrap();
        let drift = check_document(&doc, dir.path()).unwrap();
        assert_eq!(drift.status, DriftStatus::Stale);
    }

    #[test]
    fn valid_anchor_reference_counts_as_healthy() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub fn greet() {}\n").unwrap();
        let doc = dir.path().join("README.md");
        fs::write(&doc, "see src/lib.rs::greet()").unwrap();
        let drift = check_document(&doc, dir.path()).unwrap();
        assert_eq!(drift.status, DriftStatus::Healthy);
        assert_eq!(drift.health_score, 100);
    }

    #[test]
    fn missing_directory_reference_is_needs_update() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("README.md");
        fs::write(&doc, "config lives under `src/config/`").unwrap();
        let drift = check_document(&doc, dir.path()).unwrap();
        assert_eq!(drift.status, DriftStatus::NeedsUpdate);
    }

    #[test]
    fn aggregate_report_averages_health_scores() {
        let dir = tempdir().unwrap();
        let healthy = dir.path().join("a.md");
        fs::write(&healthy, "no refs").unwrap();
        let broken = dir.path().join("b.md");
        fs::write(&broken, "see `src/gone.rs`").unwrap();

        let report = check_documents(&[healthy, broken], dir.path()).unwrap();
        assert_eq!(report.healthy_count, 1);
        assert_eq!(report.critical_count, 1);
        assert_eq!(report.overall_health_score, 50.0);
    }
}
