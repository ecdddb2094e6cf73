//! Canonical error type for k0ntext-engine.
//!
//! All subsystems return `Result<T, KontextError>`. Nothing throws for
//! ordinary control flow ("not found" is a normal `Err` value, never a panic).

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KontextError {
    /// A referenced path or item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Corrupt manifest, malformed anchor, mismatched embedding dimension.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Write lock contention past the configured timeout.
    #[error("store busy: {0}")]
    Busy(String),

    /// Filesystem read/write error, permission denied.
    #[error("I/O error: {0}")]
    IoFailure(#[from] io::Error),

    /// External service refused credentials.
    #[error("auth failure: {0}")]
    AuthFailure(String),

    /// A template sync conflict was left unresolved after the resolver ran.
    #[error("unresolved conflict: {0}")]
    Conflict(String),

    /// Cooperative cancellation was observed.
    #[error("cancelled")]
    Cancelled,

    /// SQLite error (auto-converts from `rusqlite::Error`).
    #[error("sqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

impl KontextError {
    pub fn kind_name(&self) -> &'static str {
        match self {
            KontextError::NotFound(_) => "NotFound",
            KontextError::InvalidData(_) => "InvalidData",
            KontextError::Busy(_) => "Busy",
            KontextError::IoFailure(_) => "IoFailure",
            KontextError::AuthFailure(_) => "AuthFailure",
            KontextError::Conflict(_) => "Conflict",
            KontextError::Cancelled => "Cancelled",
            KontextError::Rusqlite(_) => "Rusqlite",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = KontextError::NotFound("docs/guide.md".to_string());
        assert_eq!(format!("{err}"), "not found: docs/guide.md");
    }

    #[test]
    fn kind_name_matches_variant() {
        assert_eq!(KontextError::Busy("ics".into()).kind_name(), "Busy");
        assert_eq!(KontextError::Cancelled.kind_name(), "Cancelled");
    }
}
