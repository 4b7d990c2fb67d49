//! Vector similarity candidates
//!
//! Uses the accelerated index when one is built, otherwise brute-force
//! cosine similarity over every stored chunk embedding. A disabled or
//! failing embedding capability yields no candidates; the caller degrades to
//! the lexical path.

use super::{AnnIndex, Candidate, MatchType, SearchFilter};
use crate::db::vectors::cosine_similarity;
use crate::db::Store;
use crate::embed::Embedder;
use crate::error::Result;
use rusqlite::OptionalExtension;

/// Gather vector candidates for a query
pub(crate) async fn vector_candidates(
    store: &Store,
    embedder: &dyn Embedder,
    ann: Option<&AnnIndex>,
    query: &str,
    budget: usize,
    filter: &SearchFilter<'_>,
) -> Result<Vec<Candidate>> {
    if embedder.dimensions() == 0 {
        return Ok(Vec::new());
    }

    let query_vec = match embedder.embed(&[query.to_string()]).await {
        Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
        Ok(_) => return Ok(Vec::new()),
        Err(error) => {
            tracing::warn!(%error, "query embedding failed, vector path unavailable");
            return Ok(Vec::new());
        }
    };

    let scored: Vec<(i64, f32)> = match ann {
        Some(index) if index.is_built() => index.search(&query_vec, budget),
        _ => brute_force(store, &query_vec, budget)?,
    };

    let mut candidates = Vec::with_capacity(scored.len());
    for (chunk_id, score) in scored {
        if let Some(candidate) = store.hydrate_chunk(chunk_id, score as f64, filter)? {
            candidates.push(candidate);
        }
    }
    Ok(candidates)
}

/// Cosine similarity over every stored embedding, clamped to [0,1], sorted
/// descending, truncated to the budget
fn brute_force(store: &Store, query_vec: &[f32], budget: usize) -> Result<Vec<(i64, f32)>> {
    let mut scored: Vec<(i64, f32)> = store
        .embedded_chunks()?
        .into_iter()
        .map(|chunk| {
            let score = cosine_similarity(query_vec, &chunk.embedding).clamp(0.0, 1.0);
            (chunk.chunk_id, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(budget);
    Ok(scored)
}

impl Store {
    /// Load a scored chunk as a candidate, honoring the search filter
    pub(crate) fn hydrate_chunk(
        &self,
        chunk_id: i64,
        score: f64,
        filter: &SearchFilter<'_>,
    ) -> Result<Option<Candidate>> {
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(chunk_id)];
        let filter_sql = filter.sql_clauses(&mut params);

        let sql = format!(
            "SELECT c.id, c.doc_id, d.path, c.heading, c.content
             FROM chunks c
             JOIN documents d ON d.id = c.doc_id
             WHERE c.id = ?1{filter_sql}"
        );

        let candidate = self
            .conn
            .query_row(
                &sql,
                rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
                |row| {
                    Ok(Candidate {
                        chunk_id: row.get(0)?,
                        doc_id: row.get(1)?,
                        path: row.get(2)?,
                        heading: row.get(3)?,
                        content: row.get(4)?,
                        score,
                        match_type: MatchType::Vector,
                    })
                },
            )
            .optional()?;
        Ok(candidate)
    }
}
