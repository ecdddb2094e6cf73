//! Symbol declaration extraction, language-dispatched by file extension:
//! `py, js, jsx, ts, tsx, go, rs, rb`. Regex-per-language, not a parser —
//! shallow by design.

use crate::core::hash::{Hash16, hash_content};
use regex::Regex;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: String,
    pub line: usize,
    pub signature: String,
    pub body_hash: Hash16,
}

fn patterns_for(extension: &str) -> Vec<(&'static str, Regex)> {
    let rules: &[(&str, &str)] = match extension {
        "rs" => &[
            ("function", r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+(\w+)"),
            ("struct", r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+(\w+)"),
            ("impl", r"^\s*impl(?:<[^>]*>)?\s+(?:\w+\s+for\s+)?(\w+)"),
            ("interface", r"^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+(\w+)"),
            ("module", r"^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+(\w+)"),
        ],
        "py" => &[
            ("function", r"^\s*def\s+(\w+)"),
            ("class", r"^\s*class\s+(\w+)"),
        ],
        "js" | "jsx" => &[
            ("function", r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s+(\w+)"),
            ("class", r"^\s*(?:export\s+)?(?:default\s+)?class\s+(\w+)"),
        ],
        "ts" | "tsx" => &[
            ("function", r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s+(\w+)"),
            ("class", r"^\s*(?:export\s+)?(?:default\s+)?class\s+(\w+)"),
            ("interface", r"^\s*(?:export\s+)?interface\s+(\w+)"),
        ],
        "go" => &[
            ("function", r"^\s*func\s+(?:\([^)]*\)\s+)?(\w+)"),
            ("struct", r"^\s*type\s+(\w+)\s+struct"),
            ("interface", r"^\s*type\s+(\w+)\s+interface"),
        ],
        "rb" => &[
            ("method", r"^\s*def\s+([\w.?!=]+)"),
            ("class", r"^\s*class\s+(\w+)"),
            ("module", r"^\s*module\s+(\w+)"),
        ],
        _ => return Vec::new(),
    };
    rules
        .iter()
        .filter_map(|(kind, pat)| Regex::new(pat).ok().map(|re| (*kind, re)))
        .collect()
}

fn extension_of(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase()
}

/// Extracts every symbol declaration recognized for `path`'s extension.
/// Unknown extensions yield an empty list. `body_hash` covers the slice from
/// a declaration's line to the line before the next declaration (or EOF) —
/// a coarse end-of-symbol heuristic, not a parser.
pub fn extract_symbols(path: &Path, content: &str) -> Vec<Symbol> {
    let patterns = patterns_for(&extension_of(path));
    if patterns.is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = content.lines().collect();
    let mut hits: Vec<(usize, &'static str, String, String)> = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        for (kind, re) in &patterns {
            if let Some(caps) = re.captures(line) {
                if let Some(name) = caps.get(1) {
                    hits.push((idx, kind, name.as_str().to_string(), line.trim().to_string()));
                    break;
                }
            }
        }
    }

    hits.iter()
        .enumerate()
        .map(|(i, (line_idx, kind, name, signature))| {
            let end = hits.get(i + 1).map(|(next, ..)| *next).unwrap_or(lines.len());
            let body = lines[*line_idx..end].join("\n");
            Symbol {
                name: name.clone(),
                kind: kind.to_string(),
                line: line_idx + 1,
                signature: signature.clone(),
                body_hash: hash_body(&body),
            }
        })
        .collect()
}

fn hash_body(body: &str) -> Hash16 {
    hash_content(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extracts_rust_functions_and_structs() {
        let content = "pub fn greet() {\n    println!(\"hi\");\n}\n\nstruct Thing {\n    x: i32,\n}\n";
        let symbols = extract_symbols(&PathBuf::from("src/lib.rs"), content);
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "greet");
        assert_eq!(symbols[0].kind, "function");
        assert_eq!(symbols[0].line, 1);
        assert_eq!(symbols[1].name, "Thing");
        assert_eq!(symbols[1].kind, "struct");
    }

    #[test]
    fn unknown_extension_yields_empty_list() {
        let symbols = extract_symbols(&PathBuf::from("notes.txt"), "def f(): pass");
        assert!(symbols.is_empty());
    }

    #[test]
    fn body_hash_spans_to_next_declaration() {
        let content = "def a():\n    return 1\n\ndef b():\n    return 2\n";
        let symbols = extract_symbols(&PathBuf::from("x.py"), content);
        assert_eq!(symbols.len(), 2);
        assert_ne!(symbols[0].body_hash, symbols[1].body_hash);
    }

    #[test]
    fn python_class_and_function_both_found() {
        let content = "class Foo:\n    def bar(self):\n        pass\n";
        let symbols = extract_symbols(&PathBuf::from("x.py"), content);
        let kinds: Vec<&str> = symbols.iter().map(|s| s.kind.as_str()).collect();
        assert_eq!(kinds, vec!["class", "function"]);
    }
}
