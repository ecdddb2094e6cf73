//! Seams for external collaborators this crate depends on by trait but does
//! not implement: generating embeddings and running deeper (e.g. LLM-backed)
//! drift analysis are both out of process and out of scope for this crate.
//! `Null*` implementations make every feature that takes one of these traits
//! usable with zero external wiring.

use crate::core::cancel::CancellationToken;
use crate::core::error::KontextError;
use std::path::Path;

pub trait Embedder {
    fn embed(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<f32>, KontextError>;
    fn dimension(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnalyzerFinding {
    pub message: String,
    pub line: Option<usize>,
    pub severity: String,
}

pub trait DriftAnalyzer {
    fn analyze(
        &self,
        path: &Path,
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<AnalyzerFinding>, KontextError>;
}

/// Always reports "cancelled" if asked to embed; a store with no configured
/// embedder degrades to text-only search rather than panicking.
pub struct NullEmbedder {
    pub dim: usize,
}

impl Embedder for NullEmbedder {
    fn embed(&self, _text: &str, _cancel: &CancellationToken) -> Result<Vec<f32>, KontextError> {
        Err(KontextError::InvalidData("no embedder configured".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// Reports no findings beyond what `drift::detector`'s own reference
/// validation already produces.
pub struct NullDriftAnalyzer;

impl DriftAnalyzer for NullDriftAnalyzer {
    fn analyze(
        &self,
        _path: &Path,
        _content: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<AnalyzerFinding>, KontextError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_embedder_reports_configured_dimension() {
        let e = NullEmbedder { dim: 384 };
        assert_eq!(e.dimension(), 384);
        assert!(e.embed("x", &CancellationToken::new()).is_err());
    }

    #[test]
    fn null_drift_analyzer_finds_nothing() {
        let a = NullDriftAnalyzer;
        let findings = a
            .analyze(Path::new("docs/x.md"), "content", &CancellationToken::new())
            .unwrap();
        assert!(findings.is_empty());
    }
}
