//! Inline reference token extraction (second half of C5): the five token
//! shapes documentation uses to point at source.

use regex::Regex;

#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// `path/to/file.ext:NNN` or `path/to/file.ext:NNN-MMM`.
    FileLine { path: String, line: usize, end_line: Option<usize> },
    /// ```path/to/dir/``` — a backtick-quoted path ending in `/`.
    Directory { path: String },
    /// `path/to/file.ext::identifier()`.
    Anchor { path: String, symbol: String },
    /// `[text](./relative.md)`. External (`http(s)://`) targets are ignored.
    MarkdownLink { target: String },
    /// `path/to/file.ext` in backticks, with no line/anchor suffix.
    PlainFile { path: String },
}

/// Extracts every recognized reference token from `content`. Each regex pass
/// consumes its matches before the next runs, so an anchor token is never
/// also reported as a file:line token.
pub fn extract_references(content: &str) -> Vec<Reference> {
    let mut refs = Vec::new();

    let anchor_re = Regex::new(r"([\w./-]+\.\w+)::(\w+)\(\)").unwrap();
    for caps in anchor_re.captures_iter(content) {
        refs.push(Reference::Anchor {
            path: caps[1].to_string(),
            symbol: caps[2].to_string(),
        });
    }
    let working = anchor_re.replace_all(content, "").to_string();

    let line_re = Regex::new(r"([\w./-]+\.\w+):(\d+)(?:-(\d+))?").unwrap();
    for caps in line_re.captures_iter(&working) {
        refs.push(Reference::FileLine {
            path: caps[1].to_string(),
            line: caps[2].parse().unwrap_or(0),
            end_line: caps.get(3).and_then(|m| m.as_str().parse().ok()),
        });
    }
    let working = line_re.replace_all(&working, "").to_string();

    let dir_re = Regex::new(r"`([\w./-]+/)`").unwrap();
    for caps in dir_re.captures_iter(&working) {
        refs.push(Reference::Directory { path: caps[1].to_string() });
    }
    let working = dir_re.replace_all(&working, "").to_string();

    let md_re = Regex::new(r"\[[^\]]*\]\(([^)]+)\)").unwrap();
    for caps in md_re.captures_iter(&working) {
        let target = caps[1].to_string();
        if target.starts_with("http://") || target.starts_with("https://") {
            continue;
        }
        refs.push(Reference::MarkdownLink { target });
    }
    let working = md_re.replace_all(&working, "").to_string();

    let plain_re = Regex::new(r"`([\w./-]+\.\w+)`").unwrap();
    for caps in plain_re.captures_iter(&working) {
        refs.push(Reference::PlainFile { path: caps[1].to_string() });
    }

    refs
}
