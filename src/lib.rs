//! k0ntext-engine: a local-first engine that indexes a repository's
//! AI-context artifacts, detects documentation drift against the live code
//! tree, and keeps managed template files in sync with upstream while
//! preserving user edits.
//!
//! The crate has no CLI surface of its own — `core`, `scan`, `extract`,
//! `drift`, and `template` form a library that a host binary wires together.
//! Every fallible entry point returns `Result<T, core::error::KontextError>`
//! and accepts a `core::cancel::CancellationToken` where the work spans more
//! than one file.

pub mod core;
pub mod drift;
pub mod extract;
pub mod scan;
pub mod template;

pub use core::cancel::CancellationToken;
pub use core::config::EngineConfig;
pub use core::error::KontextError;
pub use core::hash::Hash16;
