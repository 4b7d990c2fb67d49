//! Embedding storage operations
//!
//! Embeddings live inline on chunk rows as little-endian f32 blobs. A
//! separate cache table memoizes (model, chunk text hash) -> vector so
//! unchanged text is never re-embedded.

use super::Store;
use crate::error::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

impl Store {
    /// Look up a cached embedding for a chunk text hash
    pub fn cached_embedding(&self, model_id: &str, content_hash: &str) -> Result<Option<Vec<f32>>> {
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT embedding FROM embedding_cache WHERE model_id = ?1 AND content_hash = ?2",
                params![model_id, content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.map(|b| bytes_to_embedding(&b)))
    }

    /// Memoize a freshly computed embedding
    pub fn store_cached_embedding(
        &self,
        model_id: &str,
        content_hash: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO embedding_cache (model_id, content_hash, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![model_id, content_hash, embedding_to_bytes(embedding), now],
        )?;
        Ok(())
    }

    /// Drop every cache entry
    pub fn wipe_embedding_cache(&self) -> Result<usize> {
        let rows = self.conn.execute("DELETE FROM embedding_cache", [])?;
        Ok(rows)
    }

    /// Drop cache entries whose hash no longer matches any live chunk text
    pub fn cleanup_orphaned_cache_entries(&self) -> Result<usize> {
        let live: std::collections::HashSet<String> = {
            let mut stmt = self.conn.prepare("SELECT content FROM chunks")?;
            let contents = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            contents
                .iter()
                .map(|c| blake3::hash(c.as_bytes()).to_hex().to_string())
                .collect()
        };

        let stale: Vec<(String, String)> = {
            let mut stmt = self
                .conn
                .prepare("SELECT model_id, content_hash FROM embedding_cache")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<(String, String)>, _>>()?;
            rows.into_iter()
                .filter(|(_, hash)| !live.contains(hash))
                .collect()
        };

        let tx = self.conn.unchecked_transaction()?;
        for (model_id, hash) in &stale {
            tx.execute(
                "DELETE FROM embedding_cache WHERE model_id = ?1 AND content_hash = ?2",
                params![model_id, hash],
            )?;
        }
        tx.commit()?;
        Ok(stale.len())
    }

    /// Reconcile the recorded embedding width with the active model's width.
    ///
    /// A changed nonzero width clears every stored chunk embedding and wipes
    /// the cache; the store itself survives. Width 0 means the capability is
    /// disabled and never counts as drift. Returns whether a wipe happened.
    pub fn ensure_embedding_dimensions(&self, dimensions: usize) -> Result<bool> {
        if dimensions == 0 {
            return Ok(false);
        }

        let stored = self.embedding_dimensions()?;
        if stored == dimensions {
            return Ok(false);
        }

        if stored == 0 {
            self.set_meta("embedding_dimensions", &dimensions.to_string())?;
            return Ok(false);
        }

        tracing::warn!(
            stored,
            active = dimensions,
            "embedding width changed, clearing stored embeddings and cache"
        );

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("UPDATE chunks SET embedding = NULL", [])?;
        tx.execute("DELETE FROM embedding_cache", [])?;
        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('embedding_dimensions', ?1)",
            params![dimensions.to_string()],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Number of chunks currently carrying an embedding
    pub fn count_embedded_chunks(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE embedding IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Convert f32 embedding to bytes (little-endian)
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert bytes to f32 embedding
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::chunks::ChunkInsert;
    use crate::db::DocType;

    #[test]
    fn test_embedding_roundtrip() {
        let original = vec![1.0f32, 2.0, 3.0, -1.5];
        let bytes = embedding_to_bytes(&original);
        let restored = bytes_to_embedding(&bytes);
        assert_eq!(original, restored);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.0001);
    }

    #[test]
    fn test_cache_roundtrip_and_wipe() {
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();

        let vector = vec![0.25f32, -0.5, 0.75];
        store
            .store_cached_embedding("model-a", "hash1", &vector)
            .unwrap();
        assert_eq!(
            store.cached_embedding("model-a", "hash1").unwrap(),
            Some(vector)
        );
        assert_eq!(store.cached_embedding("model-b", "hash1").unwrap(), None);

        assert_eq!(store.wipe_embedding_cache().unwrap(), 1);
        assert_eq!(store.cached_embedding("model-a", "hash1").unwrap(), None);
    }

    #[test]
    fn test_dimension_drift_clears_embeddings() {
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();

        store
            .insert_document_with_chunks(
                "docs/a.md",
                "h1",
                DocType::Semantic,
                &[],
                &[ChunkInsert {
                    heading: None,
                    content: "text".to_string(),
                    embedding: Some(vec![1.0, 0.0, 0.0]),
                }],
            )
            .unwrap();
        store
            .store_cached_embedding("model-a", "hash1", &[1.0, 0.0, 0.0])
            .unwrap();

        // First sighting just records the width
        assert!(!store.ensure_embedding_dimensions(3).unwrap());
        assert_eq!(store.embedding_dimensions().unwrap(), 3);
        assert_eq!(store.count_embedded_chunks().unwrap(), 1);

        // A disabled capability is not drift
        assert!(!store.ensure_embedding_dimensions(0).unwrap());
        assert_eq!(store.count_embedded_chunks().unwrap(), 1);

        // A different nonzero width clears embeddings and cache
        assert!(store.ensure_embedding_dimensions(8).unwrap());
        assert_eq!(store.embedding_dimensions().unwrap(), 8);
        assert_eq!(store.count_embedded_chunks().unwrap(), 0);
        assert_eq!(store.cached_embedding("model-a", "hash1").unwrap(), None);
    }
}
