//! Markdown chunking
//!
//! Splits a document into bounded fragments along its structure: heading
//! blocks first, then blank-line paragraphs, then greedily packed lines,
//! then hard splits for single oversized lines. Pure function of the input
//! text; ordering is stable and equals document order.

/// Maximum chunk content length in bytes (hard splits land on char
/// boundaries, so chunks are always valid UTF-8)
pub const MAX_CHUNK_LEN: usize = 900;

/// One bounded fragment with the nearest enclosing heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPiece {
    pub heading: Option<String>,
    pub content: String,
}

/// Split markdown text into ordered, bounded chunks
pub fn chunk_markdown(text: &str) -> Vec<ChunkPiece> {
    let mut pieces = Vec::new();
    let mut heading: Option<String> = None;
    let mut block: Vec<&str> = Vec::new();

    for line in text.lines() {
        if let Some(title) = heading_text(line) {
            flush_block(&mut pieces, heading.as_deref(), &block);
            block.clear();
            heading = Some(title);
        } else {
            block.push(line);
        }
    }
    flush_block(&mut pieces, heading.as_deref(), &block);

    pieces
}

/// Heading text of a `#`/`##`/`###` line; deeper levels are body text
fn heading_text(line: &str) -> Option<String> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if !(1..=3).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if rest.starts_with(' ') || rest.starts_with('\t') {
        let title = rest.trim();
        if !title.is_empty() {
            return Some(title.to_string());
        }
    }
    None
}

fn flush_block(pieces: &mut Vec<ChunkPiece>, heading: Option<&str>, lines: &[&str]) {
    let text = lines.join("\n");
    for content in split_block(&text) {
        pieces.push(ChunkPiece {
            heading: heading.map(|h| h.to_string()),
            content,
        });
    }
}

/// Split one heading block into bounded segments
fn split_block(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.len() <= MAX_CHUNK_LEN {
        return vec![trimmed.to_string()];
    }

    let mut segments = Vec::new();
    for paragraph in split_paragraphs(trimmed) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if paragraph.len() <= MAX_CHUNK_LEN {
            segments.push(paragraph.to_string());
        } else {
            segments.extend(pack_lines(paragraph));
        }
    }
    segments
}

/// Blank-line-delimited paragraphs
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}

/// Pack lines greedily into buffers up to the maximum
fn pack_lines(paragraph: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut buffer = String::new();

    for line in paragraph.lines() {
        if line.len() > MAX_CHUNK_LEN {
            if !buffer.trim().is_empty() {
                segments.push(buffer.trim().to_string());
            }
            buffer.clear();
            segments.extend(hard_split(line));
            continue;
        }

        if !buffer.is_empty() && buffer.len() + 1 + line.len() > MAX_CHUNK_LEN {
            if !buffer.trim().is_empty() {
                segments.push(buffer.trim().to_string());
            }
            buffer.clear();
        }
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(line);
    }

    if !buffer.trim().is_empty() {
        segments.push(buffer.trim().to_string());
    }
    segments
}

/// Hard-split a single oversized line at fixed offsets
fn hard_split(line: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut start = 0;
    while start < line.len() {
        let end = floor_char_boundary(line, (start + MAX_CHUNK_LEN).min(line.len()));
        let piece = line[start..end].trim();
        if !piece.is_empty() {
            segments.push(piece.to_string());
        }
        start = end;
    }
    segments
}

/// Find a valid char boundary at or before the given byte index
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_small_document_is_one_chunk() {
        let pieces = chunk_markdown("Just a short note.");
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].heading, None);
        assert_eq!(pieces[0].content, "Just a short note.");
    }

    #[test]
    fn test_headings_label_their_blocks() {
        let text = "intro line\n\n# First\nalpha\n\n## Second\nbeta\ngamma\n\n#### Deep\nstill second";
        let pieces = chunk_markdown(text);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].heading, None);
        assert_eq!(pieces[0].content, "intro line");
        assert_eq!(pieces[1].heading.as_deref(), Some("First"));
        assert_eq!(pieces[2].heading.as_deref(), Some("Second"));
        // #### is body text, not a split point
        assert!(pieces[2].content.contains("#### Deep"));
    }

    #[test]
    fn test_oversized_block_splits_on_paragraphs() {
        let para_a = "a".repeat(500);
        let para_b = "b".repeat(500);
        let text = format!("# Big\n{}\n\n{}", para_a, para_b);
        let pieces = chunk_markdown(&text);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].content, para_a);
        assert_eq!(pieces[1].content, para_b);
        assert_eq!(pieces[1].heading.as_deref(), Some("Big"));
    }

    #[test]
    fn test_oversized_paragraph_packs_lines() {
        let line = "x".repeat(400);
        let text = format!("{line}\n{line}\n{line}");
        let pieces = chunk_markdown(&text);
        assert_eq!(pieces.len(), 2, "two lines fit per buffer, third overflows");
        assert!(pieces.iter().all(|p| p.content.len() <= MAX_CHUNK_LEN));
    }

    #[test]
    fn test_single_oversized_line_is_hard_split() {
        let line = "y".repeat(MAX_CHUNK_LEN * 2 + 10);
        let pieces = chunk_markdown(&line);
        assert_eq!(pieces.len(), 3);
        assert!(pieces.iter().all(|p| p.content.len() <= MAX_CHUNK_LEN));
        let total: usize = pieces.iter().map(|p| p.content.len()).sum();
        assert_eq!(total, line.len());
    }

    #[test]
    fn test_hard_split_respects_char_boundaries() {
        let line = "日本語のテキスト".repeat(120);
        let pieces = chunk_markdown(&line);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(piece.content.len() <= MAX_CHUNK_LEN);
            assert!(!piece.content.is_empty());
        }
    }

    #[test]
    fn test_blank_segments_are_dropped() {
        let pieces = chunk_markdown("# Title\n\n   \n\n# Next\nbody");
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].heading.as_deref(), Some("Next"));
    }

    #[test]
    fn test_reconstruction_preserves_body_content() {
        let text = "# A\nfirst block\n\nsecond paragraph\n\n# B\nthird block";
        let pieces = chunk_markdown(text);
        let rebuilt: String = pieces
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let expected: String = text
            .lines()
            .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        assert_eq!(rebuilt, expected);
    }

    fn arbitrary_markdown() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-zA-Z0-9 #.,*-]{0,120}", 0..60).prop_map(|lines| lines.join("\n"))
    }

    proptest! {
        #[test]
        fn prop_chunks_are_bounded_and_lossless(text in arbitrary_markdown()) {
            let pieces = chunk_markdown(&text);
            let mut rebuilt = String::new();
            for piece in &pieces {
                prop_assert!(piece.content.len() <= MAX_CHUNK_LEN);
                prop_assert!(!piece.content.trim().is_empty());
                rebuilt.push_str(&piece.content);
                rebuilt.push('\n');
            }
            // Every non-whitespace char of the body survives, in order
            let body_chars: Vec<char> = text
                .lines()
                .filter(|l| heading_text(l).is_none())
                .flat_map(|l| l.chars())
                .filter(|c| !c.is_whitespace())
                .collect();
            let rebuilt_chars: Vec<char> =
                rebuilt.chars().filter(|c| !c.is_whitespace()).collect();
            prop_assert_eq!(rebuilt_chars, body_chars);
        }
    }
}
