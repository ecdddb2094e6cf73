//! Timestamp and event-id helpers shared across the engine.
//!
//! Manifest and lockfile-adjacent fields require RFC3339/ISO-8601 timestamps
//! because manifest reconciliation compares them lexicographically as
//! strings — `chrono`'s `Utc::now().to_rfc3339()` always zero-pads and uses a
//! fixed-width offset, so string order matches time order.

use chrono::{SecondsFormat, Utc};
use ulid::Ulid;

/// RFC3339 timestamp in UTC, e.g. `2026-07-28T12:34:56Z`.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A filesystem-safe variant of the above for use inside file names, where a
/// literal `:` is invalid on Windows. The manifest's own timestamp fields
/// keep the literal RFC3339 form; only backup file names use this.
pub fn now_rfc3339_filename_safe() -> String {
    now_rfc3339().replace(':', "-")
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}
