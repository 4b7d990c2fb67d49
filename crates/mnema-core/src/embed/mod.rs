//! Embedding capability
//!
//! Turning text into fixed-size vectors is an injected, replaceable
//! capability. A width of 0 means the capability is disabled; consumers
//! degrade to lexical behavior instead of failing.

mod http;

pub use http::HttpEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Embedding generation capability
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identity, used as the embedding-cache key prefix
    fn model_id(&self) -> &str;

    /// Vector width; 0 means the capability is disabled
    fn dimensions(&self) -> usize;

    /// Generate embeddings for a batch of texts.
    ///
    /// Implementations degrade per text (zero vector) rather than failing
    /// the whole batch; a returned error means the capability as a whole is
    /// unavailable.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Disabled embedding capability
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEmbedder;

#[async_trait]
impl Embedder for NoopEmbedder {
    fn model_id(&self) -> &str {
        "noop"
    }

    fn dimensions(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(Vec::new())
    }
}
