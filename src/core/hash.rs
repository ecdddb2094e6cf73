//! Content hashing (C1).
//!
//! SHA-256 over UTF-8 (or raw) bytes, truncated to the leading 16 hex
//! characters. The truncation length is a schema-level invariant: the store
//! persists exactly 16 hex characters per hash and nothing in this module may
//! silently change that.

use sha2::{Digest, Sha256};
use std::fmt;
use std::ops::Deref;
use std::path::Path;

/// A 16 lowercase-hex-character content hash.
///
/// Sixteen characters of SHA-256 gives ~64 bits of collision resistance,
/// sufficient for a per-project file set (at 10^6 items the birthday bound
/// is still ~10^-7) while keeping manifests and logs scannable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Hash16(String);

impl Hash16 {
    pub const LEN: usize = 16;

    /// Hash arbitrary bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        let hex = format!("{digest:x}");
        Hash16(hex[..Self::LEN].to_string())
    }

    /// The empty hash, used as a sentinel for "could not be computed".
    pub fn empty() -> Self {
        Hash16(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a previously-serialized 16-hex-char hash, rejecting anything
    /// that isn't exactly 16 lowercase hex characters (manifests must never
    /// silently accept a truncated or corrupted hash).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == Self::LEN && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Hash16(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }
}

impl fmt::Display for Hash16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for Hash16 {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Hash16 {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hash the contents of a file, never panicking or propagating an I/O error.
///
/// Returns the empty hash on any failure (missing file, permission denied,
/// non-UTF8 is irrelevant since we hash raw bytes). Callers that need to
/// distinguish "missing" from "present but unreadable" must `stat` separately.
pub fn hash_file_safe(path: &Path) -> Hash16 {
    match std::fs::read(path) {
        Ok(bytes) => Hash16::of(&bytes),
        Err(_) => Hash16::empty(),
    }
}

/// Hash a UTF-8 string's raw bytes.
pub fn hash_content(content: &str) -> Hash16 {
    Hash16::of(content.as_bytes())
}
