//! Frontmatter parsing
//!
//! Reads the optional leading `---`-delimited YAML block of a markdown file.
//! Malformed blocks or fields degrade to "absent"; parsing never fails a
//! file.

use chrono::NaiveDate;
use serde_yaml::Value;

/// Parsed frontmatter fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    /// Extra labels to attach to the document
    pub labels: Vec<String>,
    /// Free-form provenance string, advisory only
    pub source: Option<String>,
    /// Exclusion date: the document is dropped once today >= this date
    pub expires: Option<NaiveDate>,
    /// Author-declared update date, advisory only
    pub updated: Option<NaiveDate>,
}

/// Split a document into its frontmatter and body.
///
/// Returns the parsed frontmatter (default when absent or malformed) and the
/// body text with the block stripped.
pub fn parse_frontmatter(text: &str) -> (Frontmatter, &str) {
    let Some(rest) = strip_fence(text) else {
        return (Frontmatter::default(), text);
    };

    // The block ends at the next fence line
    let mut block_end = None;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            block_end = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }

    let Some((block_len, body_start)) = block_end else {
        // Unterminated fence: treat the whole file as body
        return (Frontmatter::default(), text);
    };

    let block = &rest[..block_len];
    let body = &rest[body_start..];
    (parse_fields(block), body)
}

/// Strip the opening fence line, returning the text after it
fn strip_fence(text: &str) -> Option<&str> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }
    Some(&text[first.len()..])
}

/// Extract known fields from the YAML block, one at a time so a malformed
/// field never poisons its neighbors
fn parse_fields(block: &str) -> Frontmatter {
    let value: Value = match serde_yaml::from_str(block) {
        Ok(v) => v,
        Err(_) => return Frontmatter::default(),
    };

    let Value::Mapping(map) = value else {
        return Frontmatter::default();
    };

    let get = |key: &str| map.get(&Value::String(key.to_string()));

    Frontmatter {
        labels: get("labels").map(parse_labels).unwrap_or_default(),
        source: get("source").and_then(|v| v.as_str().map(|s| s.to_string())),
        expires: get("expires").and_then(parse_date),
        updated: get("updated").and_then(parse_date),
    }
}

/// Labels arrive as a bracketed comma list (YAML flow sequence) or, from
/// sloppier files, as one comma-separated string
fn parse_labels(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?;
    let prefix = text.trim().get(..10).unwrap_or(text.trim());
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}
