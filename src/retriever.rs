//! Nearest-neighbor retrieval of counseling examples

use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::corpus::{Dataset, Pair, render_pair};
use crate::index::{FlatIndex, IndexPaths};
use crate::provider::{EmbeddingProvider, embed_normalized};
use crate::{Error, Result};

/// Minimum candidates probed when a dataset filter is active
const FILTERED_MIN_PROBE: usize = 25;

/// Candidates probed per requested result when a dataset filter is active
const FILTERED_PROBE_FACTOR: usize = 5;

/// A pair record as read back from the pair store
///
/// Every field is optional so stores written by older builds still load.
/// Those builds used `patient`/`therapist` instead of `query`/`response`
/// and did not always carry a rendered `text`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<Dataset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub therapist: Option<String>,
}

impl StoredPair {
    /// Client utterance, falling back to the legacy field
    #[must_use]
    pub fn client_text(&self) -> Option<&str> {
        non_empty(self.query.as_deref()).or_else(|| non_empty(self.patient.as_deref()))
    }

    /// Therapist utterance, falling back to the legacy field
    #[must_use]
    pub fn therapist_text(&self) -> Option<&str> {
        non_empty(self.response.as_deref()).or_else(|| non_empty(self.therapist.as_deref()))
    }

    /// Text shown to the model, `None` if the record is unusable
    #[must_use]
    pub fn display_text(&self) -> Option<String> {
        display_text(
            self.text.as_deref(),
            self.client_text(),
            self.therapist_text(),
        )
    }
}

impl From<Pair> for StoredPair {
    fn from(pair: Pair) -> Self {
        Self {
            dataset: Some(pair.dataset),
            session_id: Some(pair.session_id),
            source_file: Some(pair.source_file),
            query: Some(pair.query),
            response: Some(pair.response),
            text: Some(pair.text),
            patient: None,
            therapist: None,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Resolve the prompt rendering of an example
///
/// A precomputed rendering wins; otherwise one is synthesized from whichever
/// side is present. Legacy `Patient:` labels become `Client:`.
#[must_use]
pub fn display_text(
    text: Option<&str>,
    client: Option<&str>,
    therapist: Option<&str>,
) -> Option<String> {
    if let Some(text) = non_empty(text) {
        return Some(normalize_labels(text));
    }

    let client = non_empty(client);
    let therapist = non_empty(therapist);
    if client.is_none() && therapist.is_none() {
        return None;
    }

    let rendered = render_pair(client.unwrap_or_default(), therapist.unwrap_or_default());
    Some(normalize_labels(rendered.trim()))
}

/// Replace legacy speaker labels
#[must_use]
pub fn normalize_labels(text: &str) -> String {
    text.replace("Patient:", "Client:")
}

/// One retrieved example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Cosine similarity with the query, when known
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub dataset: Option<Dataset>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    /// Prompt-ready rendering
    pub text: String,
}

type DedupKey<'a> = (
    Option<&'a Dataset>,
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
);

/// Searches a built index for examples similar to a user utterance
pub struct Retriever {
    index: FlatIndex,
    pairs: Vec<StoredPair>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("vectors", &self.index.len())
            .field("pairs", &self.pairs.len())
            .field("model", &self.embedder.model())
            .finish()
    }
}

impl Retriever {
    /// Load the artifacts of an index directory
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexUnavailable`] if either artifact is missing,
    /// [`Error::EmptyIndex`] if the pair store has no records, or a parse
    /// error if an artifact is corrupt
    pub fn open(dir: impl AsRef<Path>, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let paths = IndexPaths::new(dir);

        for path in [&paths.docs, &paths.index] {
            if !path.exists() {
                return Err(Error::IndexUnavailable(path.clone()));
            }
        }

        let index = FlatIndex::load(&paths.index)?;
        let pairs = read_pair_store(&paths.docs)?;
        if pairs.is_empty() {
            return Err(Error::EmptyIndex(paths.docs));
        }

        if index.len() != pairs.len() {
            tracing::warn!(
                vectors = index.len(),
                pairs = pairs.len(),
                "index and pair store disagree, rebuild recommended"
            );
        }

        tracing::info!(
            dir = %paths.dir.display(),
            vectors = index.len(),
            pairs = pairs.len(),
            "retriever ready"
        );

        Ok(Self::from_parts(index, pairs, embedder))
    }

    /// Assemble a retriever from an in-memory index and pair list
    #[must_use]
    pub fn from_parts(
        index: FlatIndex,
        pairs: Vec<StoredPair>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            index,
            pairs,
            embedder,
        }
    }

    /// Number of indexed vectors
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Find up to `k` examples whose client utterance resembles `query`
    ///
    /// Results are ordered by descending similarity and contain no two
    /// entries with the same dataset, session, query and response. An empty
    /// query or index yields no results.
    ///
    /// # Errors
    ///
    /// Returns error if the query cannot be embedded
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        dataset_filter: Option<&Dataset>,
    ) -> Result<Vec<RetrievalResult>> {
        let query = query.trim();
        if query.is_empty() || k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let vector = embed_normalized(self.embedder.as_ref(), &[query])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let probe = probe_size(k, dataset_filter.is_some(), self.index.len());
        let neighbors = self.index.search(&vector, probe);

        let mut seen: HashSet<DedupKey<'_>> = HashSet::new();
        let mut results = Vec::with_capacity(k);

        for neighbor in neighbors {
            let Ok(position) = usize::try_from(neighbor.index) else {
                continue;
            };
            let Some(pair) = self.pairs.get(position) else {
                tracing::trace!(position, "candidate outside pair store");
                continue;
            };

            if dataset_filter.is_some_and(|filter| pair.dataset.as_ref() != Some(filter)) {
                continue;
            }

            let Some(text) = pair.display_text() else {
                continue;
            };

            let key = (
                pair.dataset.as_ref(),
                pair.session_id.as_deref(),
                pair.query.as_deref(),
                pair.response.as_deref(),
            );
            if !seen.insert(key) {
                continue;
            }

            results.push(RetrievalResult {
                score: Some(neighbor.score),
                dataset: pair.dataset.clone(),
                session_id: pair.session_id.clone(),
                source_file: pair.source_file.clone(),
                query: pair.query.clone(),
                response: pair.response.clone(),
                text,
            });

            if results.len() >= k {
                break;
            }
        }

        tracing::debug!(k, probe, found = results.len(), "retrieval complete");
        Ok(results)
    }
}

/// Candidates to pull before filtering and deduplication
#[must_use]
pub fn probe_size(k: usize, filtered: bool, total: usize) -> usize {
    let base = if filtered {
        (k * FILTERED_PROBE_FACTOR).max(FILTERED_MIN_PROBE)
    } else {
        k
    };
    base.min(total)
}

/// Read every non-blank line of a pair store
fn read_pair_store(path: &Path) -> Result<Vec<StoredPair>> {
    let reader = std::io::BufReader::new(std::fs::File::open(path)?);
    let mut pairs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        pairs.push(serde_json::from_str(line)?);
    }
    Ok(pairs)
}
