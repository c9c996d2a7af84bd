//! Voice processing module
//!
//! Handles microphone capture with end-pointing, speech-to-text,
//! text-to-speech and playback.

mod capture;
mod playback;
mod stt;
mod tts;
mod vad;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use playback::{AudioPlayback, DecodedAudio, decode_mp3, resample};
pub use stt::{DEFAULT_STT_MODEL, SpeechToText};
pub use tts::{DEFAULT_TTS_MODEL, DEFAULT_TTS_VOICE, TextToSpeech};
pub use vad::{VadRecorder, VadSettings, VadState, rms};
