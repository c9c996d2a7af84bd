//! `OpenAI` API access
//!
//! One [`OpenAiClient`] is created at startup and shared (via `Arc`) by the
//! embedder, chat model, transcriber and speech synthesizer.

mod chat;
mod embeddings;

pub use chat::{DEFAULT_CHAT_MODEL, DEFAULT_TEMPERATURE, OpenAiChat};
pub use embeddings::{DEFAULT_EMBED_MODEL, OpenAiEmbedder};

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Authenticated HTTP handle for the `OpenAI` API
#[derive(Debug)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl OpenAiClient {
    /// Create a client with an API key
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(Error::Config("OpenAI API key required".to_string()));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a compatible API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a POST request to an API path such as `/embeddings`
    pub(crate) fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
    }
}

/// Turn a non-success response into an error built by `wrap`
pub(crate) async fn check_status(
    response: reqwest::Response,
    what: &str,
    wrap: fn(String) -> Error,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(%status, body = %body, "{what} API error");
    Err(wrap(format!("{what} API error {status}: {body}")))
}
