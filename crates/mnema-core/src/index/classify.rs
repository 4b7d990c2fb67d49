//! Label and type derivation from document paths

use crate::config::RootKind;
use crate::db::DocType;
use std::path::Path;

/// Archive artifact filenames that get their own label
const ARTIFACT_LABELS: &[&str] = &[
    "delta-spec",
    "discovery",
    "proposal",
    "tasks",
    "workflow",
    "design",
];

/// Derive path-based labels for a file under a watched root.
///
/// `rel_path` is relative to the root, `/`-separated.
pub fn derive_labels(kind: RootKind, rel_path: &str) -> Vec<String> {
    let mut labels = Vec::new();
    match kind {
        RootKind::Specs => {
            labels.push("spec".to_string());
            if let Some(domain) = first_segment(rel_path) {
                labels.push(normalize_label(domain));
            }
        }
        RootKind::Archive => {
            let stem = file_stem(rel_path);
            if ARTIFACT_LABELS.contains(&stem) {
                labels.push(stem.to_string());
            } else {
                labels.push("archive".to_string());
            }
            if let Some(change) = first_segment(rel_path) {
                labels.push(normalize_label(change));
            }
        }
        RootKind::Knowledge => {
            labels.push("knowledge".to_string());
            if let Some(category) = first_segment(rel_path) {
                labels.push(normalize_label(category));
            }
        }
        RootKind::Docs => {
            labels.push("doc".to_string());
        }
    }
    labels
}

/// Derive the document type from its path.
///
/// Task lists and workflows are how-to content; everything else is
/// declarative.
pub fn derive_doc_type(rel_path: &str) -> DocType {
    match file_stem(rel_path) {
        "tasks" | "workflow" => DocType::Procedural,
        _ => DocType::Semantic,
    }
}

/// Normalize a label: lower-cased, whitespace collapsed to hyphens
pub fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Merge derived and frontmatter labels, normalized and deduplicated,
/// preserving first-seen order
pub fn merge_labels(derived: Vec<String>, extra: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for label in derived.into_iter().chain(extra.iter().map(|l| normalize_label(l))) {
        if !label.is_empty() && !merged.contains(&label) {
            merged.push(label);
        }
    }
    merged
}

/// First directory segment of a relative path, None for root-level files
fn first_segment(rel_path: &str) -> Option<&str> {
    let mut parts = rel_path.split('/').filter(|p| !p.is_empty());
    let first = parts.next()?;
    // A lone filename has no enclosing segment
    parts.next().map(|_| first)
}

fn file_stem(rel_path: &str) -> &str {
    Path::new(rel_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_labels() {
        assert_eq!(
            derive_labels(RootKind::Specs, "auth/spec.md"),
            vec!["spec", "auth"]
        );
        assert_eq!(derive_labels(RootKind::Specs, "overview.md"), vec!["spec"]);
    }

    #[test]
    fn test_archive_labels() {
        assert_eq!(
            derive_labels(RootKind::Archive, "add-auth/delta-spec.md"),
            vec!["delta-spec", "add-auth"]
        );
        assert_eq!(
            derive_labels(RootKind::Archive, "add-auth/notes.md"),
            vec!["archive", "add-auth"]
        );
        assert_eq!(
            derive_labels(RootKind::Archive, "Add Auth/tasks.md"),
            vec!["tasks", "add-auth"]
        );
    }

    #[test]
    fn test_knowledge_and_doc_labels() {
        assert_eq!(
            derive_labels(RootKind::Knowledge, "patterns/retries.md"),
            vec!["knowledge", "patterns"]
        );
        assert_eq!(derive_labels(RootKind::Docs, "guide.md"), vec!["doc"]);
    }

    #[test]
    fn test_doc_type_derivation() {
        assert_eq!(derive_doc_type("add-auth/tasks.md"), DocType::Procedural);
        assert_eq!(derive_doc_type("flows/workflow.md"), DocType::Procedural);
        assert_eq!(derive_doc_type("auth/spec.md"), DocType::Semantic);
    }

    #[test]
    fn test_merge_labels_normalizes_and_dedups() {
        let merged = merge_labels(
            vec!["spec".to_string(), "auth".to_string()],
            &["Auth".to_string(), "Session Handling".to_string(), "".to_string()],
        );
        assert_eq!(merged, vec!["spec", "auth", "session-handling"]);
    }
}
