//! Text embeddings for corpus indexing and query lookup

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{OpenAiClient, check_status};
use crate::provider::EmbeddingProvider;
use crate::{Error, Result};

/// Default embedding model
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Embedder backed by the `OpenAI` embeddings endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
}

impl OpenAiEmbedder {
    #[must_use]
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Embedder using [`DEFAULT_EMBED_MODEL`]
    #[must_use]
    pub fn with_default_model(client: Arc<OpenAiClient>) -> Self {
        Self::new(client, DEFAULT_EMBED_MODEL)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post("/embeddings")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response, "embedding", Error::Embedding).await?;
        let result: EmbeddingResponse = response.json().await?;

        Ok(into_ordered(result.data))
    }
}

/// Order vectors by their input index
fn into_ordered(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    data.sort_by_key(|d| d.index);
    data.into_iter().map(|d| d.embedding).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_reordered_by_index() {
        let json = r#"{"data": [
            {"embedding": [0.0, 1.0], "index": 1, "object": "embedding"},
            {"embedding": [1.0, 0.0], "index": 0, "object": "embedding"}
        ], "model": "text-embedding-3-small"}"#;

        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let vectors = into_ordered(response.data);
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_request_shape() {
        let texts = ["aku sedih", "aku cemas"];
        let request = EmbeddingRequest {
            model: DEFAULT_EMBED_MODEL,
            input: &texts,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], DEFAULT_EMBED_MODEL);
        assert_eq!(json["input"][1], "aku cemas");
    }
}
