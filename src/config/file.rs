//! TOML configuration file loading
//!
//! Supports `~/.config/biopsy/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Corpus, index and scratch locations
    #[serde(default)]
    pub paths: PathsFileConfig,

    #[serde(default)]
    pub retrieval: RetrievalFileConfig,

    /// Model identifiers and sampling
    #[serde(default)]
    pub models: ModelsFileConfig,

    /// Microphone end-pointing
    #[serde(default)]
    pub audio: AudioFileConfig,

    #[serde(default)]
    pub safety: SafetyFileConfig,

    /// `OpenAI` access
    #[serde(default)]
    pub openai: OpenAiFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct PathsFileConfig {
    pub dataset_dir: Option<PathBuf>,
    pub hope_dir: Option<PathBuf>,
    pub hqc_dir: Option<PathBuf>,
    pub index_dir: Option<PathBuf>,
    pub tmp_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetrievalFileConfig {
    pub top_k: Option<usize>,

    /// Restrict examples to one dataset tag (e.g. "HOPE")
    pub dataset_filter: Option<String>,

    /// Rebuild the index on startup
    pub force_rebuild: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelsFileConfig {
    pub embed: Option<String>,
    pub chat: Option<String>,
    pub stt: Option<String>,
    pub tts: Option<String>,
    pub tts_voice: Option<String>,
    pub chat_temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    pub sample_rate: Option<u32>,
    pub max_record_seconds: Option<f32>,
    pub silence_seconds: Option<f32>,
    pub min_record_seconds: Option<f32>,
    pub rms_threshold: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SafetyFileConfig {
    pub enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenAiFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file, falling back to defaults
pub fn load_from(path: &Path) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/biopsy/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("biopsy").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file() {
        let fc: ConfigFile = toml::from_str(
            r#"
            [retrieval]
            top_k = 5
            dataset_filter = "HQC"

            [audio]
            silence_seconds = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(fc.retrieval.top_k, Some(5));
        assert_eq!(fc.retrieval.dataset_filter.as_deref(), Some("HQC"));
        assert_eq!(fc.audio.silence_seconds, Some(1.5));
        assert!(fc.models.chat.is_none());
        assert!(fc.paths.hope_dir.is_none());
    }

    #[test]
    fn test_unparseable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retrieval\ntop_k = ").unwrap();

        let fc = load_from(&path);
        assert!(fc.retrieval.top_k.is_none());
    }

    #[test]
    fn test_missing_file_is_default() {
        let fc = load_from(Path::new("/nonexistent/biopsy/config.toml"));
        assert!(fc.openai.api_key.is_none());
    }
}
