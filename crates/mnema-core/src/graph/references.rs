//! Reference extraction from document text
//!
//! Three reference forms count: markdown links (external URLs and anchors
//! excluded), bare mentions of path-like `.md` segments, and explicit
//! `Refs: a, b` lines. Only references that resolve to another stored
//! document survive; self-references are dropped.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

lazy_static! {
    static ref MARKDOWN_LINK_RE: Regex = Regex::new(r"\[[^\]]*\]\(([^)]+)\)").unwrap();
    static ref PATH_MENTION_RE: Regex =
        Regex::new(r"[A-Za-z0-9_.\-]+(?:/[A-Za-z0-9_.\-]+)+\.md").unwrap();
    static ref REFS_LINE_RE: Regex = Regex::new(r"(?m)^\s*Refs:\s*(.+)$").unwrap();
}

/// Build the directed adjacency list over stored document paths.
///
/// `docs` holds (path, concatenated chunk text) pairs; edges are deduplicated.
pub fn build_reference_graph(docs: &[(String, String)]) -> HashMap<String, Vec<String>> {
    let known: HashSet<&str> = docs.iter().map(|(path, _)| path.as_str()).collect();
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for (path, text) in docs {
        let mut targets: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for candidate in extract_references(text) {
            let Some(resolved) = resolve(&candidate, path, &known) else {
                continue;
            };
            if resolved == *path {
                continue;
            }
            if seen.insert(resolved.clone()) {
                targets.push(resolved);
            }
        }

        if !targets.is_empty() {
            adjacency.insert(path.clone(), targets);
        }
    }

    adjacency
}

/// Raw reference candidates found in one document's text
pub fn extract_references(text: &str) -> Vec<String> {
    let mut refs = Vec::new();

    for cap in MARKDOWN_LINK_RE.captures_iter(text) {
        if let Some(target) = cap.get(1) {
            let target = target.as_str().trim();
            if target.starts_with("http://")
                || target.starts_with("https://")
                || target.starts_with("mailto:")
                || target.starts_with('#')
            {
                continue;
            }
            // Drop any anchor suffix
            let target = target.split('#').next().unwrap_or(target);
            if !target.is_empty() {
                refs.push(target.to_string());
            }
        }
    }

    for m in PATH_MENTION_RE.find_iter(text) {
        refs.push(m.as_str().to_string());
    }

    for cap in REFS_LINE_RE.captures_iter(text) {
        if let Some(list) = cap.get(1) {
            for item in list.as_str().split(',') {
                let item = item.trim();
                if !item.is_empty() {
                    refs.push(item.to_string());
                }
            }
        }
    }

    refs
}

/// Normalize a reference: strip leading `./` and trailing `/`
fn normalize(target: &str) -> String {
    let mut t = target.trim();
    while let Some(stripped) = t.strip_prefix("./") {
        t = stripped;
    }
    t.trim_end_matches('/').to_string()
}

/// Match a candidate against the stored path set, first verbatim, then
/// resolved relative to the referencing document's directory
fn resolve(candidate: &str, source_path: &str, known: &HashSet<&str>) -> Option<String> {
    let normalized = normalize(candidate);
    if normalized.is_empty() {
        return None;
    }

    if known.contains(normalized.as_str()) {
        return Some(normalized);
    }

    let source_dir = Path::new(source_path).parent().unwrap_or(Path::new(""));
    let joined = collapse(&source_dir.join(&normalized));
    let joined = joined.to_string_lossy().replace('\\', "/");
    if known.contains(joined.as_str()) {
        return Some(joined);
    }

    None
}

/// Resolve `.` and `..` components without touching the filesystem
fn collapse(path: &Path) -> PathBuf {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir => {}
            other => parts.push(other.as_os_str()),
        }
    }
    parts.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str, text: &str) -> (String, String) {
        (path.to_string(), text.to_string())
    }

    #[test]
    fn test_markdown_links_resolve_and_skip_external() {
        let docs = vec![
            doc(
                "specs/auth/spec.md",
                "See [sessions](../sessions/spec.md) and [site](https://example.com) and [top](#top)",
            ),
            doc("specs/sessions/spec.md", "nothing"),
        ];
        let graph = build_reference_graph(&docs);
        assert_eq!(
            graph.get("specs/auth/spec.md").unwrap(),
            &vec!["specs/sessions/spec.md".to_string()]
        );
        assert!(!graph.contains_key("specs/sessions/spec.md"));
    }

    #[test]
    fn test_bare_path_mentions() {
        let docs = vec![
            doc("specs/auth/spec.md", "builds on specs/login/spec.md heavily"),
            doc("specs/login/spec.md", "x"),
        ];
        let graph = build_reference_graph(&docs);
        assert_eq!(
            graph.get("specs/auth/spec.md").unwrap(),
            &vec!["specs/login/spec.md".to_string()]
        );
    }

    #[test]
    fn test_refs_lines() {
        let docs = vec![
            doc("notes/a.md", "Refs: notes/b.md, ./notes/c.md"),
            doc("notes/b.md", "x"),
            doc("notes/c.md", "x"),
        ];
        let graph = build_reference_graph(&docs);
        let targets = graph.get("notes/a.md").unwrap();
        assert_eq!(targets.len(), 2);
        assert!(targets.contains(&"notes/b.md".to_string()));
        assert!(targets.contains(&"notes/c.md".to_string()));
    }

    #[test]
    fn test_self_and_unresolved_references_dropped() {
        let docs = vec![doc(
            "notes/a.md",
            "[self](a.md) and [ghost](missing/file.md)",
        )];
        let graph = build_reference_graph(&docs);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_anchor_suffix_is_stripped() {
        let docs = vec![
            doc("notes/a.md", "[b section](b.md#details)"),
            doc("notes/b.md", "x"),
        ];
        let graph = build_reference_graph(&docs);
        assert_eq!(
            graph.get("notes/a.md").unwrap(),
            &vec!["notes/b.md".to_string()]
        );
    }
}
