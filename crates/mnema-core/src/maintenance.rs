//! Consolidation: near-duplicate chunk removal and stale document pruning
//!
//! Both passes run on every invocation. Deduplication is a pairwise scan
//! over embedded chunks only; at corpus sizes beyond a few thousand chunks
//! this is a known scaling limit.

use crate::db::vectors::cosine_similarity;
use crate::db::Store;
use crate::error::Result;
use crate::search::scoring::compute_decayed_confidence;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Cosine similarity at or above which two chunks are duplicates
pub const DEDUP_THRESHOLD: f32 = 0.95;

/// A document untouched this long with zero accesses is a pruning candidate
pub const PRUNE_AGE_DAYS: i64 = 30;

/// Pruning requires decayed confidence at or below this value
pub const PRUNE_CONFIDENCE_CEILING: f64 = 0.15;

/// Outcome of one consolidation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidateResult {
    pub deduplicated_chunks: usize,
    pub pruned_documents: usize,
}

/// Remove near-duplicate chunks and prune stale, never-accessed documents
pub fn consolidate(store: &Store) -> Result<ConsolidateResult> {
    let deduplicated_chunks = dedupe_chunks(store)?;
    let pruned_documents = prune_documents(store)?;
    let stale_cache_entries = store.cleanup_orphaned_cache_entries()?;

    tracing::info!(
        deduplicated_chunks,
        pruned_documents,
        stale_cache_entries,
        "consolidation complete"
    );
    Ok(ConsolidateResult {
        deduplicated_chunks,
        pruned_documents,
    })
}

/// Pairwise-compare embedded chunks; at or above the threshold, the chunk of
/// the older-by-update document loses. Ties keep the first-encountered chunk.
fn dedupe_chunks(store: &Store) -> Result<usize> {
    let chunks = store.embedded_chunks()?;
    let mut marked: HashSet<i64> = HashSet::new();

    for i in 0..chunks.len() {
        if marked.contains(&chunks[i].chunk_id) {
            continue;
        }
        for j in (i + 1)..chunks.len() {
            if marked.contains(&chunks[i].chunk_id) {
                break;
            }
            if marked.contains(&chunks[j].chunk_id) {
                continue;
            }

            let similarity = cosine_similarity(&chunks[i].embedding, &chunks[j].embedding);
            if similarity < DEDUP_THRESHOLD {
                continue;
            }

            // The older document loses its copy; on equal timestamps the
            // first-encountered chunk survives
            let victim = if chunks[i].doc_updated_at < chunks[j].doc_updated_at {
                chunks[i].chunk_id
            } else {
                chunks[j].chunk_id
            };
            marked.insert(victim);
        }
    }

    let chunk_ids: Vec<i64> = marked.into_iter().collect();
    store.remove_chunks(&chunk_ids)
}

/// Prune documents that were never accessed, have not been updated for 30
/// days, and whose decayed confidence dropped to the ceiling
fn prune_documents(store: &Store) -> Result<usize> {
    let now = Utc::now();
    let cutoff = now - Duration::days(PRUNE_AGE_DAYS);
    let mut pruned = 0;

    for doc in store.all_documents()? {
        if doc.access_count != 0 {
            continue;
        }
        let Some(updated) = parse_timestamp(&doc.updated_at) else {
            continue;
        };
        if updated >= cutoff {
            continue;
        }
        let decayed = compute_decayed_confidence(doc.confidence, &doc.updated_at, now);
        if decayed > PRUNE_CONFIDENCE_CEILING {
            continue;
        }

        store.delete_document(doc.id)?;
        pruned += 1;
        tracing::debug!(path = %doc.path, "pruned stale document");
    }

    Ok(pruned)
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ChunkInsert, DocType};
    use rusqlite::params;

    fn insert_doc(store: &Store, path: &str, chunks: &[(&str, Option<Vec<f32>>)]) -> i64 {
        let inserts: Vec<ChunkInsert> = chunks
            .iter()
            .map(|(content, embedding)| ChunkInsert {
                heading: None,
                content: content.to_string(),
                embedding: embedding.clone(),
            })
            .collect();
        store
            .insert_document_with_chunks(path, "hash", DocType::Semantic, &[], &inserts)
            .unwrap()
    }

    fn backdate(store: &Store, doc_id: i64, days: i64) {
        let stamp = (Utc::now() - Duration::days(days)).to_rfc3339();
        store
            .conn
            .execute(
                "UPDATE documents SET updated_at = ?2 WHERE id = ?1",
                params![doc_id, stamp],
            )
            .unwrap();
    }

    #[test]
    fn test_duplicate_chunk_of_older_document_is_removed() {
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();

        let old = insert_doc(&store, "old.md", &[("dup text", Some(vec![1.0, 0.0, 0.0]))]);
        let new = insert_doc(&store, "new.md", &[("dup text", Some(vec![1.0, 0.0, 0.01]))]);
        backdate(&store, old, 10);

        let result = consolidate(&store).unwrap();
        assert_eq!(result.deduplicated_chunks, 1);

        let old_doc = store.get_document(old).unwrap().unwrap();
        let new_doc = store.get_document(new).unwrap().unwrap();
        assert_eq!(old_doc.chunk_count, 0, "older document loses its copy");
        assert_eq!(new_doc.chunk_count, 1);
    }

    #[test]
    fn test_dissimilar_chunks_are_both_retained() {
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();

        insert_doc(&store, "a.md", &[("alpha", Some(vec![1.0, 0.0, 0.0]))]);
        insert_doc(&store, "b.md", &[("beta", Some(vec![0.0, 1.0, 0.0]))]);

        let result = consolidate(&store).unwrap();
        assert_eq!(result.deduplicated_chunks, 0);
    }

    #[test]
    fn test_tie_keeps_first_encountered_chunk() {
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();

        let first = insert_doc(&store, "a.md", &[("dup", Some(vec![0.0, 1.0, 0.0]))]);
        let second = insert_doc(&store, "b.md", &[("dup", Some(vec![0.0, 1.0, 0.0]))]);
        // Identical timestamps
        let stamp = Utc::now().to_rfc3339();
        for id in [first, second] {
            store
                .conn
                .execute(
                    "UPDATE documents SET updated_at = ?2 WHERE id = ?1",
                    params![id, stamp],
                )
                .unwrap();
        }

        consolidate(&store).unwrap();
        assert_eq!(store.get_document(first).unwrap().unwrap().chunk_count, 1);
        assert_eq!(store.get_document(second).unwrap().unwrap().chunk_count, 0);
    }

    #[test]
    fn test_prune_requires_all_three_conditions() {
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();

        // Old, unaccessed, confidence fully decayed: pruned
        let stale = insert_doc(&store, "stale.md", &[("x", None)]);
        backdate(&store, stale, 400);

        // Unaccessed but inside the 30-day window: kept
        let aging = insert_doc(&store, "aging.md", &[("x", None)]);
        backdate(&store, aging, 20);

        // Old and decayed but accessed once: kept
        let used = insert_doc(&store, "used.md", &[("x", None)]);
        backdate(&store, used, 400);
        store
            .conn
            .execute(
                "UPDATE documents SET access_count = 1 WHERE id = ?1",
                params![used],
            )
            .unwrap();

        // Fresh: kept
        insert_doc(&store, "fresh.md", &[("x", None)]);

        let result = consolidate(&store).unwrap();
        assert_eq!(result.pruned_documents, 1);
        assert!(store.find_document("stale.md").unwrap().is_none());
        assert!(store.find_document("aging.md").unwrap().is_some());
        assert!(store.find_document("used.md").unwrap().is_some());
        assert!(store.find_document("fresh.md").unwrap().is_some());
    }
}
