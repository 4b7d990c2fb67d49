//! BM25 full-text search via FTS5, with a substring fallback
//!
//! Query terms are OR-ed so partial matches still surface. Raw BM25
//! statistics are linearly rescaled into [0,1] with the best observed
//! candidate at 1. Any FTS failure, or zero hits, falls back to a naive
//! substring scan scored by result order.

use super::{fts_query, tokenize_query, Candidate, MatchType, SearchFilter};
use crate::db::Store;
use crate::error::Result;

impl Store {
    /// Gather lexical candidates for a query
    pub(crate) fn lexical_candidates(
        &self,
        query: &str,
        budget: usize,
        filter: &SearchFilter<'_>,
    ) -> Result<Vec<Candidate>> {
        let tokens = tokenize_query(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        match self.fts_candidates(&fts_query(&tokens), budget, filter) {
            Ok(results) if !results.is_empty() => Ok(results),
            Ok(_) => self.substring_candidates(query, budget, filter),
            Err(error) => {
                tracing::debug!(%error, "FTS query failed, using substring fallback");
                self.substring_candidates(query, budget, filter)
            }
        }
    }

    fn fts_candidates(
        &self,
        match_expr: &str,
        budget: usize,
        filter: &SearchFilter<'_>,
    ) -> Result<Vec<Candidate>> {
        let mut params: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(match_expr.to_string())];
        let filter_sql = filter.sql_clauses(&mut params);

        let sql = format!(
            "SELECT c.id, c.doc_id, d.path, c.heading, c.content, bm25(chunks_fts) AS rank
             FROM chunks_fts
             JOIN chunks c ON c.id = chunks_fts.rowid
             JOIN documents d ON d.id = c.doc_id
             WHERE chunks_fts MATCH ?1{filter_sql}
             ORDER BY rank
             LIMIT {budget}"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
                |row| {
                    Ok((
                        Candidate {
                            chunk_id: row.get(0)?,
                            doc_id: row.get(1)?,
                            path: row.get(2)?,
                            heading: row.get(3)?,
                            content: row.get(4)?,
                            score: 0.0,
                            match_type: MatchType::Lexical,
                        },
                        row.get::<_, f64>(5)?,
                    ))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rescale_ranks(rows))
    }

    fn substring_candidates(
        &self,
        query: &str,
        budget: usize,
        filter: &SearchFilter<'_>,
    ) -> Result<Vec<Candidate>> {
        let needle = format!("%{}%", query.trim().to_lowercase());
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(needle)];
        let filter_sql = filter.sql_clauses(&mut params);

        let sql = format!(
            "SELECT c.id, c.doc_id, d.path, c.heading, c.content
             FROM chunks c
             JOIN documents d ON d.id = c.doc_id
             WHERE (LOWER(c.content) LIKE ?1 OR LOWER(IFNULL(c.heading, '')) LIKE ?1){filter_sql}
             ORDER BY d.path, c.chunk_index
             LIMIT {budget}"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
                |row| {
                    Ok(Candidate {
                        chunk_id: row.get(0)?,
                        doc_id: row.get(1)?,
                        path: row.get(2)?,
                        heading: row.get(3)?,
                        content: row.get(4)?,
                        score: 0.0,
                        match_type: MatchType::Lexical,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(rank, mut candidate)| {
                candidate.score = 1.0 / (1.0 + rank as f64);
                candidate
            })
            .collect())
    }
}

/// Linearly rescale raw BM25 statistics (smaller is better) into [0,1], best
/// candidate at 1
fn rescale_ranks(rows: Vec<(Candidate, f64)>) -> Vec<Candidate> {
    if rows.is_empty() {
        return Vec::new();
    }

    let best = rows
        .iter()
        .map(|(_, rank)| *rank)
        .fold(f64::INFINITY, f64::min);
    let worst = rows
        .iter()
        .map(|(_, rank)| *rank)
        .fold(f64::NEG_INFINITY, f64::max);
    let span = worst - best;

    rows.into_iter()
        .map(|(mut candidate, rank)| {
            candidate.score = if span > 0.0 { (worst - rank) / span } else { 1.0 };
            candidate
        })
        .collect()
}
