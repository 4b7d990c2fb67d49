//! Store layer for mnema
//!
//! SQLite-backed persistence with:
//! - FTS5 full-text search over chunks
//! - inline embedding blobs with a (model, text) cache
//! - co-access edges and importance scores
//! - destructive rebuild across incompatible schema revisions

mod chunks;
mod coaccess;
mod documents;
mod importance;
mod schema;
mod stats;
pub mod vectors;

pub use chunks::{ChunkInsert, EmbeddedChunk};
pub use documents::{DocType, Document, ACCESS_BOOST, INITIAL_CONFIDENCE};
pub use schema::{Store, StoreCapabilities};
pub use stats::StoreStats;

use std::path::PathBuf;

impl Store {
    /// Get the default store path
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CACHE_DIR_NAME)
            .join("index.sqlite")
    }
}
