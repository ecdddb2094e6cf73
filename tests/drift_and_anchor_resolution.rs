//! Drift detection and anchor resolution exercised against a realistic
//! small source tree.

use k0ntext_engine::drift::detector::{DriftStatus, check_document, check_documents};
use k0ntext_engine::extract::anchor::resolve;
use std::fs;
use tempfile::tempdir;

#[test]
fn anchor_resolves_to_current_line_and_kind() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(
        dir.path().join("src/auth.js"),
        "// auth module\nfunction authenticate(user) {\n  return user.ok;\n}\n",
    )
    .unwrap();

    let resolution = resolve("src/auth.js::authenticate()", dir.path());
    assert!(resolution.ok);
    assert_eq!(resolution.line, Some(2));
    assert_eq!(resolution.kind.as_deref(), Some("function"));
}

#[test]
fn renaming_the_symbol_breaks_the_anchor_and_lists_candidates() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(
        dir.path().join("src/auth.js"),
        "function verifyUser(user) {\n  return user.ok;\n}\n",
    )
    .unwrap();

    let resolution = resolve("src/auth.js::authenticate()", dir.path());
    assert!(!resolution.ok);
    assert_eq!(resolution.reason.as_deref(), Some("symbol_not_found"));
    assert!(resolution.candidates.contains(&"verifyUser".to_string()));
}

#[test]
fn anchor_against_missing_file_is_missing_file() {
    let dir = tempdir().unwrap();
    let resolution = resolve("src/nope.js::anything()", dir.path());
    assert!(!resolution.ok);
    assert_eq!(resolution.reason.as_deref(), Some("missing_file"));
}

#[test]
fn document_with_mixed_references_aggregates_to_fifty_percent_and_critical() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/lib.rs"), "pub fn greet() {}\n").unwrap();

    let doc = dir.path().join("README.md");
    fs::write(
        &doc,
        "See `src/lib.rs` for entry, and src/lib.rs::greet() for the symbol.\n\
         But `src/missing.rs` is gone, and src/lib.rs:99 is out of range.\n",
    )
    .unwrap();

    let drift = check_document(&doc, dir.path()).unwrap();
    assert_eq!(drift.health_score, 50);
    assert_eq!(drift.status, DriftStatus::Critical);
}

#[test]
fn adding_a_broken_reference_never_increases_health_score() {
    let dir = tempdir().unwrap();
    let doc = dir.path().join("README.md");
    fs::write(&doc, "nothing to see here\n").unwrap();
    let before = check_document(&doc, dir.path()).unwrap();

    fs::write(&doc, "nothing to see here, except `src/nope.rs`\n").unwrap();
    let after = check_document(&doc, dir.path()).unwrap();

    assert!(after.health_score <= before.health_score);
}

#[test]
fn corpus_report_aggregates_counts_and_mean_score() {
    let dir = tempdir().unwrap();
    let healthy = dir.path().join("a.md");
    fs::write(&healthy, "no references at all\n").unwrap();
    let broken = dir.path().join("b.md");
    fs::write(&broken, "see `src/definitely-not-here.rs`\n").unwrap();

    let report = check_documents(&[healthy, broken], dir.path()).unwrap();
    assert_eq!(report.documents.len(), 2);
    assert_eq!(report.healthy_count, 1);
    assert_eq!(report.critical_count, 1);
    assert_eq!(report.overall_health_score, 50.0);
}
