//! Configuration management for `BioPsy`
//!
//! Every setting resolves env > TOML file > default. Malformed env values
//! (an unparseable `BIOPSY_TOP_K`, say) fall through to the next source.

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};

use crate::corpus::{CorpusPaths, Dataset};
use crate::index::IndexPaths;
use crate::openai::{
    DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBED_MODEL, DEFAULT_TEMPERATURE, OpenAiClient,
};
use crate::voice::{DEFAULT_STT_MODEL, DEFAULT_TTS_MODEL, DEFAULT_TTS_VOICE, VadSettings};
use crate::{Error, Result};

use file::ConfigFile;

/// Default number of retrieved examples
pub const DEFAULT_TOP_K: usize = 3;

/// `BioPsy` configuration
#[derive(Debug)]
pub struct Config {
    pub paths: PathsConfig,
    pub retrieval: RetrievalConfig,
    pub models: ModelConfig,
    pub audio: AudioConfig,

    /// Route high-risk transcripts to the crisis reply
    pub enable_safety: bool,

    pub openai: OpenAiConfig,
}

/// Corpus, index and scratch locations
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub dataset_dir: PathBuf,
    pub hope_dir: PathBuf,
    pub hqc_dir: PathBuf,
    pub index_dir: PathBuf,

    /// Scratch space for recorded and synthesized audio
    pub tmp_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub dataset_filter: Option<Dataset>,
    pub force_rebuild: bool,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub embed: String,
    pub chat: String,
    pub stt: String,
    pub tts: String,
    pub tts_voice: String,
    pub chat_temperature: f32,
}

/// Microphone end-pointing settings
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub max_record_seconds: f32,
    pub silence_seconds: f32,
    pub min_record_seconds: f32,
    pub rms_threshold: f32,
}

#[derive(Debug)]
pub struct OpenAiConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
}

impl Config {
    /// Load configuration from the environment and the config file
    pub fn load() -> Self {
        let fc = file::load_config_file();
        Self::from_sources(|key| std::env::var(key).ok(), fc)
    }

    /// Load configuration with an explicit config file path
    pub fn load_from_file(path: &Path) -> Self {
        let fc = file::load_from(path);
        Self::from_sources(|key| std::env::var(key).ok(), fc)
    }

    /// Resolve configuration from an env lookup and a parsed file
    pub fn from_sources(env: impl Fn(&str) -> Option<String>, fc: ConfigFile) -> Self {
        let env_str = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let env_path = |key: &str| env_str(key).map(PathBuf::from);

        // Dataset layout (env > toml > ./Dataset)
        let dataset_dir = env_path("BIOPSY_DATASET_DIR")
            .or(fc.paths.dataset_dir)
            .unwrap_or_else(|| PathBuf::from("Dataset"));
        let hope_dir = env_path("BIOPSY_HOPE_DIR")
            .or(fc.paths.hope_dir)
            .unwrap_or_else(|| dataset_dir.join("HOPE"));
        let hqc_dir = env_path("BIOPSY_HQC_DIR")
            .or(fc.paths.hqc_dir)
            .unwrap_or_else(|| dataset_dir.join("High Quality Counseling"));

        let paths = PathsConfig {
            index_dir: env_path("BIOPSY_INDEX_DIR")
                .or(fc.paths.index_dir)
                .unwrap_or_else(|| PathBuf::from("indexes")),
            tmp_dir: env_path("BIOPSY_TMP_DIR")
                .or(fc.paths.tmp_dir)
                .unwrap_or_else(|| PathBuf::from("tmp")),
            dataset_dir,
            hope_dir,
            hqc_dir,
        };

        let retrieval = RetrievalConfig {
            top_k: parse_env(&env, "BIOPSY_TOP_K")
                .or(fc.retrieval.top_k)
                .unwrap_or(DEFAULT_TOP_K),
            dataset_filter: env_str("BIOPSY_DATASET_FILTER")
                .or(fc.retrieval.dataset_filter)
                .map(|tag| Dataset::from(tag.trim())),
            force_rebuild: flag_env(&env, "BIOPSY_FORCE_REBUILD")
                .or(fc.retrieval.force_rebuild)
                .unwrap_or(false),
        };

        let models = ModelConfig {
            embed: env_str("BIOPSY_EMBED_MODEL")
                .or(fc.models.embed)
                .unwrap_or_else(|| DEFAULT_EMBED_MODEL.to_string()),
            chat: env_str("BIOPSY_CHAT_MODEL")
                .or(fc.models.chat)
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            stt: env_str("BIOPSY_STT_MODEL")
                .or(fc.models.stt)
                .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
            tts: env_str("BIOPSY_TTS_MODEL")
                .or(fc.models.tts)
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            tts_voice: env_str("BIOPSY_TTS_VOICE")
                .or(fc.models.tts_voice)
                .unwrap_or_else(|| DEFAULT_TTS_VOICE.to_string()),
            chat_temperature: parse_env(&env, "BIOPSY_CHAT_TEMPERATURE")
                .or(fc.models.chat_temperature)
                .unwrap_or(DEFAULT_TEMPERATURE),
        };

        let vad = VadSettings::default();
        let audio = AudioConfig {
            sample_rate: parse_env(&env, "BIOPSY_SAMPLE_RATE")
                .or(fc.audio.sample_rate)
                .unwrap_or(vad.sample_rate),
            max_record_seconds: parse_env(&env, "BIOPSY_MAX_RECORD_SECONDS")
                .or(fc.audio.max_record_seconds)
                .unwrap_or(vad.max_seconds),
            silence_seconds: parse_env(&env, "BIOPSY_SILENCE_SECONDS")
                .or(fc.audio.silence_seconds)
                .unwrap_or(vad.silence_seconds),
            min_record_seconds: parse_env(&env, "BIOPSY_MIN_RECORD_SECONDS")
                .or(fc.audio.min_record_seconds)
                .unwrap_or(vad.min_record_seconds),
            rms_threshold: parse_env(&env, "BIOPSY_RMS_THRESHOLD")
                .or(fc.audio.rms_threshold)
                .unwrap_or(vad.rms_threshold),
        };

        let enable_safety = flag_env(&env, "BIOPSY_ENABLE_SAFETY")
            .or(fc.safety.enabled)
            .unwrap_or(true);

        let openai = OpenAiConfig {
            api_key: env_str("OPENAI_API_KEY")
                .or(fc.openai.api_key)
                .map(SecretString::from),
            base_url: env_str("OPENAI_BASE_URL")
                .or(fc.openai.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        };

        Self {
            paths,
            retrieval,
            models,
            audio,
            enable_safety,
            openai,
        }
    }

    /// Corpus locations for the index builder
    #[must_use]
    pub fn corpus_paths(&self) -> CorpusPaths {
        CorpusPaths {
            hope_dir: self.paths.hope_dir.clone(),
            hqc_dir: Some(self.paths.hqc_dir.clone()),
        }
    }

    #[must_use]
    pub fn index_paths(&self) -> IndexPaths {
        IndexPaths::new(&self.paths.index_dir)
    }

    /// End-pointing settings for the microphone recorder
    #[must_use]
    pub fn vad_settings(&self) -> VadSettings {
        VadSettings {
            sample_rate: self.audio.sample_rate,
            max_seconds: self.audio.max_record_seconds,
            silence_seconds: self.audio.silence_seconds,
            min_record_seconds: self.audio.min_record_seconds,
            rms_threshold: self.audio.rms_threshold,
            ..VadSettings::default()
        }
    }

    /// Build the shared `OpenAI` client
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured
    pub fn openai_client(&self) -> Result<OpenAiClient> {
        let key = self
            .openai
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".to_string()))?;
        let key = SecretString::from(key.expose_secret().to_string());
        Ok(OpenAiClient::new(key)?.with_base_url(&self.openai.base_url))
    }
}

/// Parse an env value, treating malformed values as unset
fn parse_env<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    raw.trim().parse().map_or_else(
        |_| {
            tracing::warn!(key, value = %raw, "ignoring malformed config value");
            None
        },
        Some,
    )
}

/// Parse a boolean flag (`1`/`0`, `true`/`false`, `yes`/`no`)
fn flag_env(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = env(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring malformed config flag");
            None
        }
    }
}
