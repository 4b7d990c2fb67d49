//! Contradiction screening between proposed and existing requirement text
//!
//! A heuristic filter, not a proof of logical inconsistency: it flags
//! candidate requirement blocks whose wording collides with existing
//! requirement blocks so a reviewer can look, it never auto-blocks silently.

use crate::db::Store;
use crate::error::Result;
use crate::index::parse_frontmatter;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Word pairs that pull in opposite directions. A pair scores when one side
/// appears in one text and the other side in the other text, either way
/// around.
const ANTONYM_PAIRS: &[(&str, &str)] = &[
    ("must", "never"),
    ("always", "don't"),
    ("enable", "disable"),
    ("allow", "deny"),
    ("require", "forbid"),
    ("include", "exclude"),
    ("add", "remove"),
    ("accept", "reject"),
    ("permit", "prohibit"),
    ("mandatory", "optional"),
];

/// Antonym presence dominates lexical overlap in the energy mix
const ANTONYM_WEIGHT: f64 = 0.6;
const OVERLAP_WEIGHT: f64 = 0.4;

/// Energy at or above which a candidate is rejected outright
pub const REJECT_THRESHOLD: f64 = 0.7;

/// Energy at or above which a candidate is flagged for review
pub const WARN_THRESHOLD: f64 = 0.3;

/// Severity of a finding; candidates below the warn threshold are not
/// reported at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContradictionLevel {
    Warn,
    Reject,
}

/// One flagged candidate/existing requirement pair
#[derive(Debug, Clone, Serialize)]
pub struct ContradictionFinding {
    /// Capability and requirement name of the proposed block
    pub source: String,
    /// Stored document and requirement name of the conflicting block
    pub target: String,
    /// Combined coherence energy in [0,1]
    pub energy: f64,
    pub level: ContradictionLevel,
    pub details: String,
}

/// Score a candidate change directory against stored requirement documents.
///
/// The directory holds `specs/<capability>/spec.md` delta documents whose
/// `## ADDED Requirements` / `## MODIFIED Requirements` sections carry
/// `### Requirement:` blocks. Each such block is compared against every
/// requirement block of the stored document at `specs/<capability>/spec.md`.
/// Only warn/reject findings are returned, sorted descending by energy.
pub fn check_contradictions(
    store: &Store,
    candidate_change_dir: &Path,
) -> Result<Vec<ContradictionFinding>> {
    let mut findings = Vec::new();

    for (capability, delta_text) in read_delta_documents(candidate_change_dir)? {
        let target_path = format!("specs/{}/spec.md", capability);
        let Some(target_doc) = store.find_document(&target_path)? else {
            continue;
        };
        let target_text = store.document_text(target_doc.id)?;
        let existing_blocks = requirement_blocks(&target_text);
        if existing_blocks.is_empty() {
            continue;
        }

        for candidate in candidate_requirement_blocks(&delta_text) {
            for existing in &existing_blocks {
                let antonym = antonym_score(&candidate.text, &existing.text);
                let overlap = jaccard_overlap(&candidate.text, &existing.text);
                let energy = ANTONYM_WEIGHT * antonym + OVERLAP_WEIGHT * overlap;

                let level = if energy >= REJECT_THRESHOLD {
                    ContradictionLevel::Reject
                } else if energy >= WARN_THRESHOLD {
                    ContradictionLevel::Warn
                } else {
                    continue;
                };

                findings.push(ContradictionFinding {
                    source: format!("{}/{}", capability, candidate.name),
                    target: format!("{}#{}", target_path, existing.name),
                    energy,
                    level,
                    details: format!(
                        "antonym score {:.2}, lexical overlap {:.2}",
                        antonym, overlap
                    ),
                });
            }
        }
    }

    findings.sort_by(|a, b| {
        b.energy
            .partial_cmp(&a.energy)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(findings)
}

/// Fraction of antonym pairs straddling the two texts, order-independent
pub fn antonym_score(a: &str, b: &str) -> f64 {
    let matched = ANTONYM_PAIRS
        .iter()
        .filter(|(left, right)| {
            (contains_word(a, left) && contains_word(b, right))
                || (contains_word(a, right) && contains_word(b, left))
        })
        .count();
    matched as f64 / ANTONYM_PAIRS.len() as f64
}

/// Token-set Jaccard similarity, case-insensitive, split on non-alphanumerics
pub fn jaccard_overlap(a: &str, b: &str) -> f64 {
    let set_a = token_set(a);
    let set_b = token_set(b);
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

fn token_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Case-insensitive word-boundary containment
fn contains_word(text: &str, word: &str) -> bool {
    let haystack = text.to_lowercase();
    let needle = word.to_lowercase();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(&needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let left_ok = begin == 0
            || !haystack[..begin]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let right_ok = end == haystack.len()
            || !haystack[end..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric());
        if left_ok && right_ok {
            return true;
        }
        start = begin + needle.len();
    }
    false
}

/// A named requirement block
#[derive(Debug, Clone)]
struct RequirementBlock {
    name: String,
    text: String,
}

/// Split text into `### Requirement:` blocks; text without any becomes one
/// unnamed block
fn requirement_blocks(text: &str) -> Vec<RequirementBlock> {
    let mut blocks: Vec<RequirementBlock> = Vec::new();
    let mut current: Option<RequirementBlock> = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("### Requirement:") {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(RequirementBlock {
                name: rest.trim().to_string(),
                text: String::new(),
            });
        } else if let Some(block) = current.as_mut() {
            block.text.push_str(line);
            block.text.push('\n');
        }
    }
    if let Some(block) = current.take() {
        blocks.push(block);
    }

    if blocks.is_empty() && !text.trim().is_empty() {
        blocks.push(RequirementBlock {
            name: "(whole document)".to_string(),
            text: text.to_string(),
        });
    }
    blocks
}

/// Requirement blocks under the ADDED/MODIFIED sections of a delta document
fn candidate_requirement_blocks(delta_text: &str) -> Vec<RequirementBlock> {
    let mut blocks = Vec::new();
    let mut in_delta_section = false;
    let mut section_lines: Vec<&str> = Vec::new();

    let flush = |lines: &mut Vec<&str>, blocks: &mut Vec<RequirementBlock>| {
        if !lines.is_empty() {
            let text = lines.join("\n");
            blocks.extend(
                requirement_blocks(&text)
                    .into_iter()
                    .filter(|b| b.name != "(whole document)"),
            );
            lines.clear();
        }
    };

    for line in delta_text.lines() {
        if let Some(title) = line.strip_prefix("## ") {
            flush(&mut section_lines, &mut blocks);
            let title = title.trim().to_lowercase();
            in_delta_section =
                title.starts_with("added requirement") || title.starts_with("modified requirement");
            continue;
        }
        if in_delta_section {
            section_lines.push(line);
        }
    }
    flush(&mut section_lines, &mut blocks);

    blocks
}

/// Delta documents in a change directory as (capability, text)
fn read_delta_documents(change_dir: &Path) -> Result<Vec<(String, String)>> {
    let specs_dir = change_dir.join("specs");
    let mut deltas = Vec::new();
    if !specs_dir.is_dir() {
        return Ok(deltas);
    }

    let mut entries: Vec<_> = std::fs::read_dir(&specs_dir)?
        .filter_map(|entry| entry.ok())
        .collect();
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let capability = entry.file_name().to_string_lossy().to_string();
        let delta_path = entry.path().join("spec.md");
        if !delta_path.is_file() {
            continue;
        }
        let raw = std::fs::read_to_string(&delta_path)?;
        let (_, body) = parse_frontmatter(&raw);
        deltas.push((capability, body.to_string()));
    }
    Ok(deltas)
}
