//! Remote HTTP embedding provider.
//!
//! Talks to a local embedding endpoint (Ollama-style API): POST
//! `{"model": ..., "prompt": ...}`, response `{"embedding": [f32, ...]}`.
//! Every transport or shape error maps to `EmbeddingUnavailable` so the
//! search engine can degrade instead of failing the query.

use serde::Deserialize;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::embedding::{normalize, EmbeddingProvider, EMBEDDING_DIM};
use crate::error::{EngramError, Result};

pub struct RemoteEmbeddingProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl RemoteEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        })
    }
}

impl EmbeddingProvider for RemoteEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": text,
            }))
            .send()
            .map_err(|e| EngramError::EmbeddingUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngramError::EmbeddingUnavailable(format!(
                "endpoint returned HTTP {}",
                response.status()
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| EngramError::EmbeddingUnavailable(format!("bad response shape: {e}")))?;

        let mut vector = parsed.embedding;
        if vector.len() != EMBEDDING_DIM {
            return Err(EngramError::EmbeddingUnavailable(format!(
                "expected {EMBEDDING_DIM} dimensions, got {}",
                vector.len()
            )));
        }

        normalize(&mut vector);
        Ok(vector)
    }
}
