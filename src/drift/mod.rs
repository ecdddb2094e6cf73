//! Documentation drift detection (C7): validates every reference a document
//! makes against the live tree and aggregates the result into a health score.

pub mod detector;

pub use detector::{
    DocumentDrift, DriftIssue, DriftLevel, DriftReport, DriftStatus, check_document,
};
