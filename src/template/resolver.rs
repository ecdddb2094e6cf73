//! Conflict Resolver: policy engine driving the Merger's conflict path.
//! `ResolutionStrategy` is a trait so Interactive/Batch/Force/DryRun are four
//! concrete implementors; the Interactive one is a thin adapter around an
//! injected prompt callback — the actual terminal UI belongs to a host
//! application, so this crate only defines the seam.

use crate::template::comparator::FileComparison;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    KeepLocal,
    Overwrite,
    Skip,
}

pub trait ResolutionStrategy {
    /// `diff` is the unified textual diff for display; strategies that never
    /// show one (Force, DryRun) simply ignore it.
    fn resolve(&mut self, conflict: &FileComparison, diff: &str) -> ConflictDecision;
}

/// For each conflict: `{show-diff, keep-local, overwrite, skip}`.
/// `show-diff` re-prompts the same file after the diff is displayed, so the
/// injected callback is asked again until it returns a terminal choice.
pub struct InteractiveResolver<F>
where
    F: FnMut(&FileComparison, &str) -> InteractiveChoice,
{
    prompt: F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveChoice {
    ShowDiff,
    KeepLocal,
    Overwrite,
    Skip,
}

impl<F> InteractiveResolver<F>
where
    F: FnMut(&FileComparison, &str) -> InteractiveChoice,
{
    pub fn new(prompt: F) -> Self {
        Self { prompt }
    }
}

impl<F> ResolutionStrategy for InteractiveResolver<F>
where
    F: FnMut(&FileComparison, &str) -> InteractiveChoice,
{
    fn resolve(&mut self, conflict: &FileComparison, diff: &str) -> ConflictDecision {
        loop {
            match (self.prompt)(conflict, diff) {
                InteractiveChoice::ShowDiff => continue,
                InteractiveChoice::KeepLocal => return ConflictDecision::KeepLocal,
                InteractiveChoice::Overwrite => return ConflictDecision::Overwrite,
                InteractiveChoice::Skip => return ConflictDecision::Skip,
            }
        }
    }
}

/// Before individual prompts: `{keep-all, overwrite-all, individual}`. Once
/// a batch decision is made it applies to every remaining conflict without
/// further prompting.
pub enum BatchChoice {
    KeepAll,
    OverwriteAll,
    Individual,
}

pub struct BatchResolver<F, G>
where
    F: FnOnce() -> BatchChoice,
    G: FnMut(&FileComparison, &str) -> InteractiveChoice,
{
    upfront: Option<F>,
    decided: Option<BatchChoice>,
    individual_prompt: G,
}

impl<F, G> BatchResolver<F, G>
where
    F: FnOnce() -> BatchChoice,
    G: FnMut(&FileComparison, &str) -> InteractiveChoice,
{
    pub fn new(upfront: F, individual_prompt: G) -> Self {
        Self { upfront: Some(upfront), decided: None, individual_prompt }
    }
}

impl<F, G> ResolutionStrategy for BatchResolver<F, G>
where
    F: FnOnce() -> BatchChoice,
    G: FnMut(&FileComparison, &str) -> InteractiveChoice,
{
    fn resolve(&mut self, conflict: &FileComparison, diff: &str) -> ConflictDecision {
        if self.decided.is_none() {
            let upfront = self.upfront.take().expect("upfront choice consumed exactly once");
            self.decided = Some(upfront());
        }
        match self.decided.as_ref().unwrap() {
            BatchChoice::KeepAll => ConflictDecision::KeepLocal,
            BatchChoice::OverwriteAll => ConflictDecision::Overwrite,
            BatchChoice::Individual => loop {
                match (self.individual_prompt)(conflict, diff) {
                    InteractiveChoice::ShowDiff => continue,
                    InteractiveChoice::KeepLocal => return ConflictDecision::KeepLocal,
                    InteractiveChoice::Overwrite => return ConflictDecision::Overwrite,
                    InteractiveChoice::Skip => return ConflictDecision::Skip,
                }
            },
        }
    }
}

/// Equivalent to batch overwrite-all with zero prompts.
pub struct ForceResolver;

impl ResolutionStrategy for ForceResolver {
    fn resolve(&mut self, _conflict: &FileComparison, _diff: &str) -> ConflictDecision {
        ConflictDecision::Overwrite
    }
}

/// No decisions asked; every conflict is reported with its classification
/// and would-be action, but nothing is applied.
#[derive(Default)]
pub struct DryRunResolver {
    pub would_be: Vec<(String, ConflictDecision)>,
}

impl ResolutionStrategy for DryRunResolver {
    fn resolve(&mut self, conflict: &FileComparison, _diff: &str) -> ConflictDecision {
        self.would_be.push((conflict.path.clone(), ConflictDecision::Skip));
        ConflictDecision::Skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::hash_content;
    use crate::template::comparator::ComparisonState;

    fn conflict(path: &str) -> FileComparison {
        FileComparison {
            path: path.to_string(),
            state: ComparisonState::Conflict,
            template_hash: Some(hash_content("t")),
            local_hash: Some(hash_content("l")),
            manifest_hash: Some(hash_content("m")),
            user_modified: true,
            original_hash: Some(hash_content("m")),
        }
    }

    #[test]
    fn force_resolver_always_overwrites() {
        let mut resolver = ForceResolver;
        assert_eq!(resolver.resolve(&conflict("a.md"), ""), ConflictDecision::Overwrite);
        assert_eq!(resolver.resolve(&conflict("b.md"), ""), ConflictDecision::Overwrite);
    }

    #[test]
    fn interactive_resolver_reprompts_on_show_diff() {
        let mut calls = 0;
        let mut resolver = InteractiveResolver::new(|_, _| {
            calls += 1;
            if calls == 1 { InteractiveChoice::ShowDiff } else { InteractiveChoice::KeepLocal }
        });
        let decision = resolver.resolve(&conflict("a.md"), "diff text");
        assert_eq!(decision, ConflictDecision::KeepLocal);
        assert_eq!(calls, 2);
    }

    #[test]
    fn batch_resolver_applies_overwrite_all_without_individual_prompts() {
        let mut prompted = false;
        let mut resolver = BatchResolver::new(
            || BatchChoice::OverwriteAll,
            |_, _| {
                prompted = true;
                InteractiveChoice::Skip
            },
        );
        assert_eq!(resolver.resolve(&conflict("a.md"), ""), ConflictDecision::Overwrite);
        assert_eq!(resolver.resolve(&conflict("b.md"), ""), ConflictDecision::Overwrite);
        assert!(!prompted);
    }

    #[test]
    fn batch_resolver_individual_mode_delegates_per_file() {
        let mut resolver = BatchResolver::new(
            || BatchChoice::Individual,
            |c, _| if c.path == "a.md" { InteractiveChoice::KeepLocal } else { InteractiveChoice::Overwrite },
        );
        assert_eq!(resolver.resolve(&conflict("a.md"), ""), ConflictDecision::KeepLocal);
        assert_eq!(resolver.resolve(&conflict("b.md"), ""), ConflictDecision::Overwrite);
    }

    #[test]
    fn dry_run_resolver_reports_without_applying() {
        let mut resolver = DryRunResolver::default();
        let decision = resolver.resolve(&conflict("a.md"), "");
        assert_eq!(decision, ConflictDecision::Skip);
        assert_eq!(resolver.would_be, vec![("a.md".to_string(), ConflictDecision::Skip)]);
    }
}
