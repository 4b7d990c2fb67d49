//! Indexing pipeline
//!
//! Reconciles the store against the watched file set: discovers markdown
//! files, chunks and embeds changed documents, removes vanished or expired
//! ones, and recomputes importance scores over the whole corpus.

mod chunker;
mod classify;
mod frontmatter;
mod scanner;

pub use chunker::{chunk_markdown, ChunkPiece, MAX_CHUNK_LEN};
pub use classify::{derive_doc_type, derive_labels, merge_labels, normalize_label};
pub use frontmatter::{parse_frontmatter, Frontmatter};
pub use scanner::{scan_files, ScanOptions, ScanResult};

use crate::config::{Config, RootKind};
use crate::db::{ChunkInsert, Store};
use crate::embed::Embedder;
use crate::error::Result;
use crate::graph::{build_reference_graph, pagerank};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::PathBuf;

/// Outcome of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
}

/// Hash document text using SHA-256
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cache key for one chunk's text
fn chunk_cache_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// One file found under a watched root
#[derive(Debug, Clone)]
struct DiscoveredFile {
    abs_path: PathBuf,
    stored_path: String,
    relative_path: String,
    kind: RootKind,
}

/// Reconcile the store against the current file set.
///
/// Documents are processed in discovery order; deletions happen before
/// inserts and updates. Every per-document write is one transaction, so a
/// crash mid-run leaves prior state intact and the next run retries the
/// document (its hash still differs).
pub async fn reindex(
    store: &Store,
    config: &Config,
    embedder: &dyn Embedder,
) -> Result<IndexStats> {
    store.ensure_embedding_dimensions(embedder.dimensions())?;

    let discovered = discover(config)?;
    let discovered_paths: HashSet<&str> =
        discovered.iter().map(|f| f.stored_path.as_str()).collect();

    let mut stats = IndexStats::default();

    // Vanished files first
    for path in store.all_document_paths()? {
        if !discovered_paths.contains(path.as_str()) {
            store.delete_document_by_path(&path)?;
            stats.removed += 1;
        }
    }

    let today = Utc::now().date_naive();

    for file in &discovered {
        let raw = match std::fs::read_to_string(&file.abs_path) {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(path = %file.abs_path.display(), %error, "unreadable file skipped");
                continue;
            }
        };

        let (fm, body) = parse_frontmatter(&raw);

        if let Some(expires) = fm.expires {
            if today >= expires {
                if store.delete_document_by_path(&file.stored_path)? {
                    stats.removed += 1;
                }
                continue;
            }
        }

        let hash = hash_content(&raw);
        let labels = merge_labels(derive_labels(file.kind, &file.relative_path), &fm.labels);
        let doc_type = derive_doc_type(&file.relative_path);

        match store.find_document(&file.stored_path)? {
            None => {
                let chunks = embed_pieces(store, embedder, chunk_markdown(body)).await?;
                store.insert_document_with_chunks(
                    &file.stored_path,
                    &hash,
                    doc_type,
                    &labels,
                    &chunks,
                )?;
                stats.added += 1;
            }
            Some(doc) if doc.content_hash != hash => {
                let chunks = embed_pieces(store, embedder, chunk_markdown(body)).await?;
                store.replace_document_content(doc.id, &hash, doc_type, &labels, &chunks)?;
                stats.updated += 1;
            }
            Some(doc) => {
                let stored_labels = store.document_labels(doc.id)?;
                let mut sorted = labels.clone();
                sorted.sort();
                if stored_labels != sorted || doc.doc_type != doc_type {
                    store.resync_document_metadata(doc.id, &labels, doc_type)?;
                    stats.updated += 1;
                } else {
                    stats.unchanged += 1;
                }
            }
        }
    }

    rebuild_importance(store)?;

    tracing::info!(
        added = stats.added,
        updated = stats.updated,
        removed = stats.removed,
        unchanged = stats.unchanged,
        "reindex complete"
    );
    Ok(stats)
}

/// Recompute the reference graph and persist importance scores for the whole
/// corpus
pub fn rebuild_importance(store: &Store) -> Result<()> {
    let docs = store.all_documents()?;
    let mut texts = Vec::with_capacity(docs.len());
    for doc in &docs {
        texts.push((doc.path.clone(), store.document_text(doc.id)?));
    }

    let adjacency = build_reference_graph(&texts);
    let nodes: Vec<String> = texts.iter().map(|(path, _)| path.clone()).collect();
    let scores = pagerank(&nodes, &adjacency);
    store.write_importance(&scores)
}

fn discover(config: &Config) -> Result<Vec<DiscoveredFile>> {
    let options = ScanOptions::default();
    let mut discovered = Vec::new();
    for root in &config.roots {
        let root_name = root.name();
        for scan in scan_files(&root.path, &options)? {
            discovered.push(DiscoveredFile {
                abs_path: scan.path,
                stored_path: format!("{}/{}", root_name, scan.relative_path),
                relative_path: scan.relative_path,
                kind: root.kind,
            });
        }
    }
    Ok(discovered)
}

/// Chunk inserts with embeddings attached, cache-aware.
///
/// A failed embed call degrades to "no embedding for these chunks"; the
/// indexing run goes on.
async fn embed_pieces(
    store: &Store,
    embedder: &dyn Embedder,
    pieces: Vec<ChunkPiece>,
) -> Result<Vec<ChunkInsert>> {
    let mut inserts: Vec<ChunkInsert> = pieces
        .into_iter()
        .map(|piece| ChunkInsert {
            heading: piece.heading,
            content: piece.content,
            embedding: None,
        })
        .collect();

    if embedder.dimensions() == 0 {
        return Ok(inserts);
    }

    let model = embedder.model_id();
    let hashes: Vec<String> = inserts
        .iter()
        .map(|c| chunk_cache_hash(&c.content))
        .collect();

    let mut missing_indices = Vec::new();
    let mut missing_texts = Vec::new();
    for (i, insert) in inserts.iter_mut().enumerate() {
        if let Some(cached) = store.cached_embedding(model, &hashes[i])? {
            insert.embedding = Some(cached);
        } else {
            missing_indices.push(i);
            missing_texts.push(insert.content.clone());
        }
    }

    if missing_texts.is_empty() {
        return Ok(inserts);
    }

    match embedder.embed(&missing_texts).await {
        Ok(vectors) => {
            for (j, &i) in missing_indices.iter().enumerate() {
                if let Some(vector) = vectors.get(j) {
                    store.store_cached_embedding(model, &hashes[i], vector)?;
                    inserts[i].embedding = Some(vector.clone());
                }
            }
        }
        Err(error) => {
            tracing::warn!(%error, "embedding unavailable, indexing without vectors");
        }
    }

    Ok(inserts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchedRoot;
    use crate::embed::NoopEmbedder;

    fn write(dir: &std::path::Path, rel: &str, text: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn config_for(temp: &tempfile::TempDir) -> Config {
        Config {
            store_path: None,
            roots: vec![WatchedRoot::new(temp.path().join("specs"), RootKind::Specs)],
            embedding: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_expired_documents_are_dropped() {
        let temp = tempfile::TempDir::new().unwrap();
        write(
            temp.path(),
            "specs/auth/spec.md",
            "---\nexpires: 2001-01-01\n---\n# Auth\nold requirement",
        );
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();
        let config = config_for(&temp);

        let stats = reindex(&store, &config, &NoopEmbedder).await.unwrap();
        assert_eq!(stats.added, 0);
        assert_eq!(stats.removed, 0, "nothing stored yet, nothing removed");
        assert!(store.find_document("specs/auth/spec.md").unwrap().is_none());

        // An already-indexed document that later expires gets deleted
        write(temp.path(), "specs/auth/spec.md", "# Auth\nnow valid");
        let stats = reindex(&store, &config, &NoopEmbedder).await.unwrap();
        assert_eq!(stats.added, 1);

        write(
            temp.path(),
            "specs/auth/spec.md",
            "---\nexpires: 2001-01-01\n---\n# Auth\nexpired again",
        );
        let stats = reindex(&store, &config, &NoopEmbedder).await.unwrap();
        assert_eq!(stats.removed, 1);
        assert!(store.find_document("specs/auth/spec.md").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_label_drift_resyncs_without_chunk_rewrite() {
        let temp = tempfile::TempDir::new().unwrap();
        write(temp.path(), "specs/auth/spec.md", "# Auth\nbody text");
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();
        let config = config_for(&temp);

        reindex(&store, &config, &NoopEmbedder).await.unwrap();
        let doc = store.find_document("specs/auth/spec.md").unwrap().unwrap();
        assert_eq!(store.document_labels(doc.id).unwrap(), vec!["auth", "spec"]);

        // Same content hash, new root kind: labels drift, chunks stay
        let config = Config {
            roots: vec![WatchedRoot::new(
                temp.path().join("specs"),
                RootKind::Knowledge,
            )],
            ..config
        };
        let stats = reindex(&store, &config, &NoopEmbedder).await.unwrap();
        assert_eq!(stats.updated, 1);
        let doc = store.find_document("specs/auth/spec.md").unwrap().unwrap();
        assert_eq!(
            store.document_labels(doc.id).unwrap(),
            vec!["auth", "knowledge"]
        );
        assert_eq!(doc.chunk_count, 1);
    }
}
