//! HTTP-backed embedder for OpenAI-compatible embedding services

use super::Embedder;
use crate::config::EmbeddingServiceConfig;
use crate::error::{MnemaError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Option<Vec<f32>>,
}

/// Embedder that calls an external `/v1/embeddings` endpoint.
///
/// The service is probed once on first use to learn the vector width; the
/// probe result is cached for the process lifetime. A per-text failure in a
/// batch yields a zero vector of the expected width instead of failing the
/// whole batch.
pub struct HttpEmbedder {
    config: EmbeddingServiceConfig,
    client: reqwest::Client,
    probed_dimensions: OnceCell<usize>,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            client,
            probed_dimensions: OnceCell::new(),
        })
    }

    /// Create from environment-backed defaults
    pub fn from_env() -> Result<Self> {
        Self::new(EmbeddingServiceConfig::default())
    }

    async fn request(&self, texts: Vec<String>) -> Result<Vec<Option<Vec<f32>>>> {
        let url = format!("{}/v1/embeddings", self.config.url.trim_end_matches('/'));
        let request = EmbedRequest {
            model: self.config.model.clone(),
            input: texts,
        };

        let mut req = self.client.post(&url).json(&request);
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MnemaError::Embedding(format!(
                "embedding service error (HTTP {}): {}",
                status, body
            )));
        }

        let parsed: EmbedResponse = response.json().await?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Learn the service's vector width, once per process.
    async fn load_dimensions(&self) -> Result<usize> {
        self.probed_dimensions
            .get_or_try_init(|| async {
                if let Some(dims) = self.config.dimensions {
                    return Ok(dims);
                }
                let probe = self.request(vec!["dimension probe".to_string()]).await?;
                let dims = probe
                    .first()
                    .and_then(|v| v.as_ref())
                    .map(|v| v.len())
                    .ok_or_else(|| {
                        MnemaError::Embedding("embedding service returned no vector".into())
                    })?;
                tracing::info!(model = %self.config.model, dims, "embedding service probed");
                Ok(dims)
            })
            .await
            .map(|d| *d)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn dimensions(&self) -> usize {
        // Configured width, or whatever the probe already learned. Before the
        // first embed call an unconfigured service reports 0 and callers
        // treat the capability as unavailable.
        self.config
            .dimensions
            .or_else(|| self.probed_dimensions.get().copied())
            .unwrap_or(0)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let dims = self.load_dimensions().await?;
        let raw = self.request(texts.to_vec()).await?;

        let mut vectors = Vec::with_capacity(texts.len());
        for i in 0..texts.len() {
            match raw.get(i).and_then(|v| v.clone()) {
                Some(v) if v.len() == dims => vectors.push(v),
                _ => {
                    tracing::warn!(index = i, "embedding missing or mis-sized, using zero vector");
                    vectors.push(vec![0.0; dims]);
                }
            }
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprobed_service_reports_disabled() {
        let config = EmbeddingServiceConfig {
            url: "http://localhost:1".to_string(),
            model: "test-model".to_string(),
            dimensions: None,
            api_key: None,
            timeout_secs: 1,
        };
        let embedder = HttpEmbedder::new(config).unwrap();
        assert_eq!(embedder.dimensions(), 0);
        assert_eq!(embedder.model_id(), "test-model");
    }

    #[test]
    fn test_configured_dimensions_win() {
        let config = EmbeddingServiceConfig {
            url: "http://localhost:1".to_string(),
            model: "test-model".to_string(),
            dimensions: Some(384),
            api_key: None,
            timeout_secs: 1,
        };
        let embedder = HttpEmbedder::new(config).unwrap();
        assert_eq!(embedder.dimensions(), 384);
    }
}
