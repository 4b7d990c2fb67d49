//! The full search pipeline
//!
//! Gathers candidates for the requested mode, blends raw scores with decayed
//! confidence and relative importance, deduplicates per document, and writes
//! back access and co-access statistics for the final result set.

use super::scoring::{compute_decayed_confidence, confidence_blend, importance_blend};
use super::vector::vector_candidates;
use super::{
    fetch_budget, rrf_fusion, AnnIndex, Candidate, SearchFilter, SearchMode, SearchOptions,
    SearchResult,
};
use crate::db::{Document, Store};
use crate::embed::Embedder;
use crate::error::Result;
use chrono::Utc;
use std::collections::HashMap;

/// Number of top result documents linked pairwise by co-access edges
const CO_ACCESS_TOP: usize = 5;

/// Execute a search against the store.
///
/// `ann` is the accelerated vector index when one was built; `None` means
/// the brute-force path. An empty query returns an empty list without
/// touching the store.
pub async fn search(
    store: &Store,
    embedder: &dyn Embedder,
    ann: Option<&AnnIndex>,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let budget = fetch_budget(options);
    let filter = SearchFilter {
        labels: &options.labels,
        doc_type: options.doc_type,
    };

    let candidates = match options.mode {
        SearchMode::Lexical => store.lexical_candidates(query, budget, &filter)?,
        SearchMode::Vector => {
            let vec = vector_candidates(store, embedder, ann, query, budget, &filter).await?;
            if vec.is_empty() {
                // Semantic search unavailable (or empty store side): degrade
                // to the lexical path
                store.lexical_candidates(query, budget, &filter)?
            } else {
                vec
            }
        }
        SearchMode::Hybrid => {
            let lexical = store.lexical_candidates(query, budget, &filter)?;
            let vector = vector_candidates(store, embedder, ann, query, budget, &filter).await?;
            rrf_fusion(&lexical, &vector)
        }
    };

    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let mut ranked = blend_scores(store, candidates)?;
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });

    if options.dedupe {
        ranked = dedupe_per_document(ranked, options.max_chunks_per_doc.max(1));
    }
    ranked.truncate(options.limit);

    record_statistics(store, &ranked)?;

    let mut results = Vec::with_capacity(ranked.len());
    for candidate in ranked {
        let labels = store.document_labels(candidate.doc_id)?;
        let doc_type = store
            .get_document(candidate.doc_id)?
            .map(|d| d.doc_type)
            .unwrap_or(crate::db::DocType::Semantic);
        results.push(SearchResult {
            path: candidate.path,
            heading: candidate.heading,
            content: candidate.content,
            score: candidate.score,
            match_type: candidate.match_type,
            labels,
            doc_type,
        });
    }
    Ok(results)
}

/// Blend raw candidate scores by decayed confidence and, when any document
/// carries importance, by relative importance
fn blend_scores(store: &Store, candidates: Vec<Candidate>) -> Result<Vec<Candidate>> {
    let now = Utc::now();
    let max_importance = store.max_importance()?;

    let mut docs: HashMap<i64, Document> = HashMap::new();
    let mut blended = candidates;
    for candidate in blended.iter_mut() {
        if !docs.contains_key(&candidate.doc_id) {
            match store.get_document(candidate.doc_id)? {
                Some(doc) => {
                    docs.insert(candidate.doc_id, doc);
                }
                None => continue,
            }
        }
        let doc = &docs[&candidate.doc_id];

        let decayed = compute_decayed_confidence(doc.confidence, &doc.updated_at, now);
        candidate.score *= confidence_blend(decayed);
        if max_importance > 0.0 {
            candidate.score *= importance_blend(doc.pagerank, max_importance);
        }
    }
    Ok(blended)
}

/// Keep at most `max_per_doc` results per document path, preserving score
/// order
fn dedupe_per_document(ranked: Vec<Candidate>, max_per_doc: usize) -> Vec<Candidate> {
    let mut per_doc: HashMap<String, usize> = HashMap::new();
    ranked
        .into_iter()
        .filter(|candidate| {
            let count = per_doc.entry(candidate.path.clone()).or_insert(0);
            *count += 1;
            *count <= max_per_doc
        })
        .collect()
}

/// Record access counts for every result document and co-access edges among
/// the top results
fn record_statistics(store: &Store, ranked: &[Candidate]) -> Result<()> {
    let mut distinct: Vec<i64> = Vec::new();
    for candidate in ranked {
        if !distinct.contains(&candidate.doc_id) {
            distinct.push(candidate.doc_id);
        }
    }
    store.record_access(&distinct)?;

    let mut top_docs: Vec<i64> = Vec::new();
    for candidate in ranked.iter().take(CO_ACCESS_TOP) {
        if !top_docs.contains(&candidate.doc_id) {
            top_docs.push(candidate.doc_id);
        }
    }
    store.record_co_access(&top_docs)?;
    Ok(())
}
