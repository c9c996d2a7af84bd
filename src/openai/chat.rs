//! Chat completions

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{OpenAiClient, check_status};
use crate::provider::{ChatMessage, ChatProvider};
use crate::{Error, Result};

/// Default chat model
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4.1-mini";

/// Sampling temperature used for counseling replies
pub const DEFAULT_TEMPERATURE: f32 = 0.4;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat model backed by the `OpenAI` chat completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: Arc<OpenAiClient>,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    #[must_use]
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post("/chat/completions")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response, "chat", Error::Chat).await?;
        let result: ChatResponse = response.json().await?;

        let reply = first_content(result);
        tracing::debug!(model = %self.model, reply_len = reply.len(), "chat completion");
        Ok(reply)
    }
}

fn first_content(response: ChatResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_content_trimmed() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "  Halo, aku di sini.  "}}]}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(first_content(response), "Halo, aku di sini.");
    }

    #[test]
    fn test_missing_content() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(first_content(response), "");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert_eq!(first_content(empty), "");
    }

    #[test]
    fn test_request_shape() {
        let messages = [ChatMessage::system("persona"), ChatMessage::user("halo")];
        let request = ChatRequest {
            model: "gpt-4.1-mini",
            messages: &messages,
            temperature: DEFAULT_TEMPERATURE,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "persona");
    }
}
