//! Symbol and reference extraction (C5) and anchor resolution (C6).

pub mod anchor;
pub mod references;
pub mod symbols;

pub use anchor::{Resolution, resolve};
pub use references::{Reference, extract_references};
pub use symbols::{Symbol, extract_symbols};
