//! Directory scanning and content hashing (C4).

pub mod scanner;

pub use scanner::{ScanFile, scan_and_hash};
