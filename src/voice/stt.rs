//! Speech-to-text (STT) processing

use std::sync::Arc;

use crate::openai::{OpenAiClient, check_status};
use crate::{Error, Result};

/// Default transcription model
pub const DEFAULT_STT_MODEL: &str = "gpt-4o-mini-transcribe";

/// Response from the transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Transcribes recorded speech to text
#[derive(Debug, Clone)]
pub struct SpeechToText {
    client: Arc<OpenAiClient>,
    model: String,
}

impl SpeechToText {
    #[must_use]
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Transcribe WAV audio to text
    ///
    /// The transcript is trimmed. An empty string means nothing was said.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects the audio
    pub async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), model = %self.model, "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav.to_vec())
                    .file_name("user.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post("/audio/transcriptions")
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;
        let response = check_status(response, "transcription", Error::Stt).await?;

        let result: TranscriptionResponse = response.json().await?;
        let text = result.text.trim().to_string();

        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }
}
