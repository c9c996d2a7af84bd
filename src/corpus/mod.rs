//! Counseling corpus ingestion
//!
//! Turns raw transcript files into ordered client/therapist [`Pair`]s.
//! Two source formats are supported:
//!
//! - [`hope`]: tabular CSV transcripts with `ID`, `Type`, `Utterance` columns
//! - [`hqc`]: line-oriented transcripts of `T: ...` / `C: ...` lines
//!
//! Both adapters produce [`Turn`] sequences per file; pairs are then derived
//! by [`make_pairs`] from every client turn immediately followed by a
//! therapist turn.

pub mod hope;
pub mod hqc;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Speaker of a single transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The person seeking help
    Client,
    /// The counselor
    Therapist,
}

/// One cleaned utterance from a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub utterance: String,
}

impl Turn {
    /// Build a turn from raw text, returning `None` when nothing remains after cleaning
    #[must_use]
    pub fn new(role: Role, raw: &str) -> Option<Self> {
        let utterance = clean_text(raw);
        if utterance.is_empty() {
            return None;
        }
        Some(Self { role, utterance })
    }
}

/// Source corpus a pair was ingested from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Dataset {
    /// Tabular HOPE transcripts
    Hope,
    /// High Quality Counseling plain-text transcripts
    Hqc,
    /// Any other corpus tag found in a pair store
    Other(String),
}

impl Dataset {
    /// Tag as written to the pair store
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Hope => "HOPE",
            Self::Hqc => "HQC",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for Dataset {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("HOPE") {
            Self::Hope
        } else if value.eq_ignore_ascii_case("HQC") {
            Self::Hqc
        } else {
            Self::Other(value)
        }
    }
}

impl From<&str> for Dataset {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Dataset> for String {
    fn from(value: Dataset) -> Self {
        match value {
            Dataset::Other(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized client utterance and the therapist response that followed it
///
/// Only `query` is embedded; `response` is kept as a style example and
/// `text` is the rendering placed verbatim into prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub dataset: Dataset,
    pub session_id: String,
    pub source_file: String,
    pub query: String,
    pub response: String,
    pub text: String,
}

impl Pair {
    /// Build a pair from raw utterances
    ///
    /// Returns `None` if either side is empty after cleaning.
    #[must_use]
    pub fn new(
        dataset: Dataset,
        session_id: impl Into<String>,
        source_file: impl Into<String>,
        client: &str,
        therapist: &str,
    ) -> Option<Self> {
        let query = clean_text(client);
        let response = clean_text(therapist);
        if query.is_empty() || response.is_empty() {
            return None;
        }

        Some(Self {
            text: render_pair(&query, &response),
            dataset,
            session_id: session_id.into(),
            source_file: source_file.into(),
            query,
            response,
        })
    }
}

/// Canonical two-line rendering used in prompts
#[must_use]
pub fn render_pair(client: &str, therapist: &str) -> String {
    format!("Client: {client}\nTherapist: {therapist}")
}

/// Collapse whitespace runs (non-breaking spaces included) to one space and trim
#[must_use]
pub fn clean_text(raw: &str) -> String {
    raw.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive pairs from an ordered turn sequence
///
/// Every position where a client turn is directly followed by a therapist
/// turn yields one pair. Other transitions are skipped and the scan moves on
/// by a single turn, so a therapist turn can still open the next window.
#[must_use]
pub fn make_pairs(
    turns: &[Turn],
    dataset: &Dataset,
    session_id: &str,
    source_file: &str,
) -> Vec<Pair> {
    turns
        .windows(2)
        .filter_map(|window| match window {
            [client, therapist]
                if client.role == Role::Client && therapist.role == Role::Therapist =>
            {
                Pair::new(
                    dataset.clone(),
                    session_id,
                    source_file,
                    &client.utterance,
                    &therapist.utterance,
                )
            }
            _ => None,
        })
        .collect()
}

/// Locations of the raw corpora
#[derive(Debug, Clone)]
pub struct CorpusPaths {
    /// Required tabular corpus
    pub hope_dir: PathBuf,
    /// Optional line-oriented corpus
    pub hqc_dir: Option<PathBuf>,
}

/// Ingest every configured corpus into one ordered pair sequence
///
/// HOPE pairs come first, followed by HQC pairs, each in file-name order.
///
/// # Errors
///
/// Returns error if the HOPE directory is missing, holds no CSV files, or a
/// file cannot be parsed. A missing HQC directory is only logged.
pub fn collect_pairs(paths: &CorpusPaths) -> Result<Vec<Pair>> {
    if !paths.hope_dir.is_dir() {
        return Err(Error::CorpusMissing(paths.hope_dir.clone()));
    }

    let mut pairs = hope::load_pairs(&paths.hope_dir)?;
    tracing::info!(
        dir = %paths.hope_dir.display(),
        pairs = pairs.len(),
        "ingested HOPE corpus"
    );

    match paths.hqc_dir.as_deref() {
        Some(dir) if dir.is_dir() => {
            let hqc = hqc::load_pairs(dir)?;
            if hqc.is_empty() {
                tracing::warn!(dir = %dir.display(), "HQC corpus produced no pairs");
            } else {
                tracing::info!(dir = %dir.display(), pairs = hqc.len(), "ingested HQC corpus");
            }
            pairs.extend(hqc);
        }
        Some(dir) => {
            tracing::warn!(dir = %dir.display(), "HQC directory not found, indexing HOPE only");
        }
        None => {
            tracing::warn!("HQC directory not configured, indexing HOPE only");
        }
    }

    Ok(pairs)
}

/// File name without extension, used as a fallback session id
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name for provenance
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Sorted regular, non-hidden files of a directory matching `keep`
pub(crate) fn list_files(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'));
        if path.is_file() && !hidden && keep(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Every file that contributes to the index, in a stable order
///
/// Each file is keyed by its path relative to the corpus root, rooted at its
/// dataset tag (`HOPE/1.csv`, `HQC/session_a.txt`), so equally named files
/// of different datasets stay distinct.
///
/// # Errors
///
/// Returns error if a configured directory cannot be listed
pub fn corpus_files(paths: &CorpusPaths) -> Result<Vec<(String, PathBuf)>> {
    let keyed = |dataset: &Dataset, files: Vec<PathBuf>| {
        files
            .into_iter()
            .map(|path| (format!("{dataset}/{}", file_name(&path)), path))
            .collect::<Vec<_>>()
    };

    let mut files = keyed(&Dataset::Hope, hope::csv_files(&paths.hope_dir)?);
    if let Some(dir) = paths.hqc_dir.as_deref().filter(|d| d.is_dir()) {
        files.extend(keyed(&Dataset::Hqc, hqc::transcript_files(dir)?));
    }
    Ok(files)
}
