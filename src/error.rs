//! Error types for BioPsy

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for BioPsy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in BioPsy
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Primary corpus directory is missing or holds no transcripts
    #[error("corpus not found: {}", .0.display())]
    CorpusMissing(PathBuf),

    /// A corpus file could not be ingested
    #[error("ingest error in {file}: {message}")]
    Ingest {
        /// File name that violated the expected format
        file: String,
        /// What went wrong
        message: String,
    },

    /// Ingestion produced no client/therapist pairs
    #[error("no client->therapist pairs were produced from the corpus")]
    EmptyCorpus,

    /// Index artifacts have not been built yet
    #[error("index not built, missing {}", .0.display())]
    IndexUnavailable(PathBuf),

    /// Pair store exists but holds no records
    #[error("pair store is empty: {}", .0.display())]
    EmptyIndex(PathBuf),

    /// Vector index is corrupt or inconsistent
    #[error("index error: {0}")]
    Index(String),

    /// Embedding error
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Chat completion error
    #[error("chat error: {0}")]
    Chat(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSV parsing error
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
