//! Text-to-speech (TTS) processing

use std::sync::Arc;

use crate::openai::{OpenAiClient, check_status};
use crate::{Error, Result};

/// Default speech model
pub const DEFAULT_TTS_MODEL: &str = "gpt-4o-mini-tts";

/// Default speaking voice
pub const DEFAULT_TTS_VOICE: &str = "sage";

#[derive(serde::Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// Synthesizes spoken replies
#[derive(Debug, Clone)]
pub struct TextToSpeech {
    client: Arc<OpenAiClient>,
    model: String,
    voice: String,
}

impl TextToSpeech {
    #[must_use]
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            voice: voice.into(),
        }
    }

    /// Synthesize text to MP3 audio
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "mp3",
        };

        let response = self
            .client
            .post("/audio/speech")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response, "speech", Error::Tts).await?;

        let audio = response.bytes().await?;
        tracing::debug!(chars = text.len(), audio_bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}
