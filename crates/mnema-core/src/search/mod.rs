//! Search engine module
//!
//! Provides:
//! - BM25 full-text search via FTS5 with a substring fallback
//! - Vector similarity search with an optional HNSW index
//! - Hybrid search with RRF fusion
//! - Confidence/importance score blending and access recording

mod ann_index;
mod hybrid;
mod lexical;
pub mod scoring;
mod unified;
mod vector;

pub use ann_index::AnnIndex;
pub use scoring::compute_decayed_confidence;
pub use unified::search;

pub(crate) use hybrid::rrf_fusion;

use crate::db::DocType;

/// Search mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    Lexical,
    Vector,
    #[default]
    Hybrid,
}

/// Which retrieval path produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Lexical,
    Vector,
    Hybrid,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Lexical => "lexical",
            MatchType::Vector => "vector",
            MatchType::Hybrid => "hybrid",
        }
    }
}

/// Search options
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub mode: SearchMode,
    /// Maximum number of results
    pub limit: usize,
    /// Labels the document must all carry
    pub labels: Vec<String>,
    /// Restrict to one document type
    pub doc_type: Option<DocType>,
    /// Collapse results to at most `max_chunks_per_doc` per document
    pub dedupe: bool,
    pub max_chunks_per_doc: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            limit: 10,
            labels: Vec::new(),
            doc_type: None,
            dedupe: true,
            max_chunks_per_doc: 1,
        }
    }
}

/// Search result
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub path: String,
    pub heading: Option<String>,
    pub content: String,
    pub score: f64,
    pub match_type: MatchType,
    pub labels: Vec<String>,
    pub doc_type: DocType,
}

/// One scored chunk on its way through the pipeline
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub chunk_id: i64,
    pub doc_id: i64,
    pub path: String,
    pub heading: Option<String>,
    pub content: String,
    pub score: f64,
    pub match_type: MatchType,
}

/// Filters applied while gathering candidates
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchFilter<'a> {
    pub labels: &'a [String],
    pub doc_type: Option<DocType>,
}

impl SearchFilter<'_> {
    /// Render the filter as SQL against document alias `d`, appending its
    /// parameters
    pub(crate) fn sql_clauses(&self, params: &mut Vec<Box<dyn rusqlite::ToSql>>) -> String {
        let mut sql = String::new();
        for label in self.labels {
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM document_labels dl WHERE dl.doc_id = d.id AND dl.label = ?{})",
                params.len() + 1
            ));
            params.push(Box::new(label.clone()));
        }
        if let Some(doc_type) = self.doc_type {
            sql.push_str(&format!(" AND d.doc_type = ?{}", params.len() + 1));
            params.push(Box::new(doc_type.as_str().to_string()));
        }
        sql
    }
}

/// Whitespace query tokens
pub fn tokenize_query(query: &str) -> Vec<String> {
    query.split_whitespace().map(|t| t.to_string()).collect()
}

/// OR-of-terms FTS5 match expression, terms quoted against operator syntax
pub(crate) fn fts_query(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Candidate over-fetch budget: enough to survive per-document dedupe, capped
pub(crate) fn fetch_budget(options: &SearchOptions) -> usize {
    (options.limit * options.max_chunks_per_doc.max(1) * 3)
        .min(100)
        .max(options.limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fts_query_quotes_terms() {
        let tokens = tokenize_query("retry \"backoff\" policy");
        assert_eq!(
            fts_query(&tokens),
            "\"retry\" OR \"\"\"backoff\"\"\" OR \"policy\""
        );
    }

    #[test]
    fn test_fetch_budget_caps_at_100() {
        let options = SearchOptions {
            limit: 50,
            max_chunks_per_doc: 4,
            ..Default::default()
        };
        assert_eq!(fetch_budget(&options), 100);

        let options = SearchOptions::default();
        assert_eq!(fetch_budget(&options), 30);
    }
}
