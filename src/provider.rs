//! Service seams for embedding and chat completion
//!
//! The retrieval core only talks to these traits. A single concrete client
//! (see [`crate::openai`]) is constructed once at startup and handed to the
//! index builder, retriever and session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Produces embedding vectors for text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier; build and query must use the same one
    fn model(&self) -> &str;

    /// Embed a batch of texts, one vector per input in input order
    ///
    /// Vectors are not required to be normalized; callers apply
    /// [`normalize`] before indexing or searching.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

/// Generates a reply from a chat message sequence
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one completion and return the assistant text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Scale a vector to unit length in place
///
/// Zero vectors are left untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Embed texts and normalize every vector
///
/// # Errors
///
/// Returns error if the provider fails or returns a different number of
/// vectors than inputs
pub async fn embed_normalized(
    provider: &dyn EmbeddingProvider,
    texts: &[&str],
) -> Result<Vec<Vec<f32>>> {
    let mut vectors = provider.embed(texts).await?;
    if vectors.len() != texts.len() {
        return Err(crate::Error::Embedding(format!(
            "expected {} embeddings, got {}",
            texts.len(),
            vectors.len()
        )));
    }
    for vector in &mut vectors {
        normalize(vector);
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_chat_message_serde() {
        let json = serde_json::to_string(&ChatMessage::system("hi")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"hi"}"#);
    }
}
