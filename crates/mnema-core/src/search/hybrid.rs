//! Hybrid search with Reciprocal Rank Fusion

use super::{Candidate, MatchType};
use std::collections::HashMap;

/// RRF constant (standard value)
pub const RRF_K: f64 = 60.0;

/// Merge lexical and vector candidate lists by Reciprocal Rank Fusion.
///
/// Each list contributes `1 / (k + rank + 1)` per candidate; a candidate in
/// both lists is tagged hybrid. The fused list is sorted descending and
/// renormalized so the top score is 1.
pub(crate) fn rrf_fusion(lexical: &[Candidate], vector: &[Candidate]) -> Vec<Candidate> {
    let mut fused: HashMap<i64, (f64, bool, bool, Candidate)> = HashMap::new();

    for (rank, candidate) in lexical.iter().enumerate() {
        let rrf = 1.0 / (RRF_K + rank as f64 + 1.0);
        let entry = fused
            .entry(candidate.chunk_id)
            .or_insert((0.0, false, false, candidate.clone()));
        entry.0 += rrf;
        entry.1 = true;
    }

    for (rank, candidate) in vector.iter().enumerate() {
        let rrf = 1.0 / (RRF_K + rank as f64 + 1.0);
        let entry = fused
            .entry(candidate.chunk_id)
            .or_insert((0.0, false, false, candidate.clone()));
        entry.0 += rrf;
        entry.2 = true;
    }

    let mut results: Vec<Candidate> = fused
        .into_values()
        .map(|(score, in_lexical, in_vector, mut candidate)| {
            candidate.score = score;
            candidate.match_type = match (in_lexical, in_vector) {
                (true, true) => MatchType::Hybrid,
                (false, true) => MatchType::Vector,
                _ => MatchType::Lexical,
            };
            candidate
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });

    if let Some(top) = results.first().map(|c| c.score) {
        if top > 0.0 {
            for candidate in results.iter_mut() {
                candidate.score /= top;
            }
        }
    }

    results
}
