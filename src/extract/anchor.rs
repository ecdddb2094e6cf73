//! Anchor Resolver (C6): turns `file::symbol()` into a current line number
//! and body hash, or a diagnostic explaining why it couldn't.

use crate::core::hash::Hash16;
use crate::extract::symbols::extract_symbols;
use regex::Regex;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub ok: bool,
    pub reason: Option<String>,
    pub line: Option<usize>,
    pub signature: Option<String>,
    pub body_hash: Option<Hash16>,
    pub kind: Option<String>,
    pub candidates: Vec<String>,
    pub kind_ambiguous: bool,
}

impl Resolution {
    fn failure(reason: &str) -> Self {
        Self { ok: false, reason: Some(reason.to_string()), ..Default::default() }
    }
}

/// `anchor` is `file::symbol()`, e.g. `src/lib.rs::greet()`.
pub fn resolve(anchor: &str, project_root: &Path) -> Resolution {
    let re = Regex::new(r"^(.+)::(\w+)\(\)$").unwrap();
    let Some(caps) = re.captures(anchor) else {
        return Resolution::failure("format");
    };
    let file = &caps[1];
    let name = &caps[2];

    let path = project_root.join(crate::core::path::normalize(file));
    let Ok(content) = std::fs::read_to_string(&path) else {
        return Resolution::failure("missing_file");
    };

    let symbols = extract_symbols(&path, &content);
    let matches: Vec<_> = symbols.iter().filter(|s| s.name == name).collect();

    if matches.is_empty() {
        return Resolution {
            ok: false,
            reason: Some("symbol_not_found".to_string()),
            candidates: symbols.into_iter().map(|s| s.name).collect(),
            ..Default::default()
        };
    }

    let first = matches[0];
    Resolution {
        ok: true,
        reason: None,
        line: Some(first.line),
        signature: Some(first.signature.clone()),
        body_hash: Some(first.body_hash.clone()),
        kind: Some(first.kind.clone()),
        candidates: Vec::new(),
        kind_ambiguous: matches.len() > 1,
    }
}
