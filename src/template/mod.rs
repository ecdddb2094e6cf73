//! Template Sync Engine (C8-C11): comparator, merger, conflict resolver, and
//! the manifest manager that ties all three to the Indexed Content Store.

pub mod comparator;
pub mod engine;
pub mod manifest;
pub mod merger;
pub mod resolver;

pub use comparator::{ComparisonState, FileComparison, classify, compare_trees};
pub use engine::{ConflictOutcome, SyncOptions, SyncResult, TemplateSyncEngine};
pub use merger::{MergeMethod, MergeOutcome, Merger};
pub use resolver::{
    BatchChoice, BatchResolver, ConflictDecision, DryRunResolver, ForceResolver, InteractiveChoice,
    InteractiveResolver, ResolutionStrategy,
};
