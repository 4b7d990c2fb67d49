//! HNSW approximate nearest neighbor index over chunk embeddings

use crate::db::vectors::cosine_similarity;
use crate::db::Store;
use crate::error::Result;
use instant_distance::{Builder, HnswMap, Search};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Minimum embedding count to justify building an ANN index.
/// Below this threshold, brute-force is fast enough.
const ANN_THRESHOLD: usize = 1000;

/// Wrapper for f32 vectors implementing instant_distance::Point
#[derive(Clone)]
struct EmbeddingPoint {
    values: Vec<f32>,
}

impl instant_distance::Point for EmbeddingPoint {
    fn distance(&self, other: &Self) -> f32 {
        // Cosine distance = 1.0 - cosine_similarity
        1.0 - cosine_similarity(&self.values, &other.values)
    }
}

/// HNSW-backed approximate nearest neighbor index keyed by chunk id
pub struct AnnIndex {
    index: RwLock<Option<HnswMap<EmbeddingPoint, i64>>>,
    embedding_count: AtomicUsize,
}

impl AnnIndex {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(None),
            embedding_count: AtomicUsize::new(0),
        }
    }

    /// Build index from stored chunk embeddings.
    /// Skips building if fewer than ANN_THRESHOLD embeddings.
    pub fn build_from_store(store: &Store) -> Result<Self> {
        let embeddings = store.embedded_chunks()?;

        let count = embeddings.len();
        let ann = Self::new();
        ann.embedding_count.store(count, Ordering::Relaxed);

        if count < ANN_THRESHOLD {
            tracing::debug!(
                count,
                threshold = ANN_THRESHOLD,
                "skipping ANN index build"
            );
            return Ok(ann);
        }

        let (points, keys): (Vec<EmbeddingPoint>, Vec<i64>) = embeddings
            .into_iter()
            .map(|chunk| (EmbeddingPoint { values: chunk.embedding }, chunk.chunk_id))
            .unzip();

        let hnsw_map = Builder::default().build(points, keys);

        *ann.index
            .write()
            .map_err(|e| crate::error::MnemaError::Search(format!("ANN lock poisoned: {}", e)))? =
            Some(hnsw_map);

        tracing::info!(count, "built ANN index");
        Ok(ann)
    }

    /// Search the ANN index for k nearest neighbors.
    /// Returns (chunk_id, score) pairs with score = max(0, 1 - distance).
    /// Returns empty vec if index not built.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(i64, f32)> {
        let guard = match self.index.read() {
            Ok(g) => g,
            Err(_) => return vec![],
        };

        let map = match guard.as_ref() {
            Some(m) => m,
            None => return vec![],
        };

        let query_point = EmbeddingPoint {
            values: query.to_vec(),
        };
        let mut search = Search::default();

        map.search(&query_point, &mut search)
            .take(k)
            .map(|item| {
                let score = (1.0 - item.distance).max(0.0);
                (*item.value, score)
            })
            .collect()
    }

    /// Whether the HNSW index has been built
    pub fn is_built(&self) -> bool {
        self.index.read().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Number of embeddings loaded (even if index wasn't built)
    pub fn len(&self) -> usize {
        self.embedding_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AnnIndex {
    fn default() -> Self {
        Self::new()
    }
}
