//! Index construction from the raw corpus

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures::{StreamExt, TryStreamExt};

use super::IndexPaths;
use super::flat::FlatIndex;
use super::manifest::{MANIFEST_VERSION, Manifest, fingerprint, write_atomic};
use crate::corpus::{self, CorpusPaths, Pair};
use crate::provider::{EmbeddingProvider, embed_normalized};
use crate::{Error, Result};

/// Client utterances sent per embedding request
pub const EMBED_BATCH_SIZE: usize = 128;

/// Embedding requests in flight during a build
const EMBED_CONCURRENCY: usize = 4;

/// Summary of a completed build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub pairs: usize,
    pub dimension: usize,
}

/// Result of [`IndexBuilder::ensure`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Existing artifacts were kept
    Fresh,
    /// Artifacts were (re)built
    Built(BuildReport),
}

/// Builds the pair store and vector index for a corpus
pub struct IndexBuilder {
    paths: IndexPaths,
    corpus: CorpusPaths,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IndexBuilder {
    #[must_use]
    pub fn new(paths: IndexPaths, corpus: CorpusPaths, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            paths,
            corpus,
            embedder,
        }
    }

    #[must_use]
    pub const fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    /// Build the index unless usable artifacts already exist
    ///
    /// With `force` the index is always rebuilt. Otherwise existing
    /// artifacts are kept unless their manifest records a different
    /// embedding model or corpus fingerprint.
    ///
    /// # Errors
    ///
    /// Returns error if a required build fails
    pub async fn ensure(&self, force: bool) -> Result<EnsureOutcome> {
        if !force && self.paths.artifacts_exist() {
            match self.staleness() {
                None => {
                    tracing::debug!(dir = %self.paths.dir.display(), "index is up to date");
                    return Ok(EnsureOutcome::Fresh);
                }
                Some(reason) => {
                    tracing::info!(reason, "index is stale, rebuilding");
                }
            }
        } else if force {
            tracing::info!("forced index rebuild");
        } else {
            tracing::info!(dir = %self.paths.dir.display(), "index not found, building");
        }

        self.build().await.map(EnsureOutcome::Built)
    }

    /// Why existing artifacts must be rebuilt, if they must
    fn staleness(&self) -> Option<&'static str> {
        let manifest = match Manifest::load(&self.paths.manifest) {
            Ok(Some(manifest)) => manifest,
            Ok(None) => return self.unmanifested_staleness(),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable index manifest");
                return Some("manifest unreadable");
            }
        };

        if manifest.format_version != MANIFEST_VERSION {
            return Some("manifest version changed");
        }
        if manifest.embed_model != self.embedder.model() {
            return Some("embedding model changed");
        }

        match self.corpus_fingerprint() {
            Ok(current) if current != manifest.corpus_fingerprint => Some("corpus changed"),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "cannot fingerprint corpus, keeping existing index");
                None
            }
        }
    }

    /// Artifacts without a manifest are kept only while they agree in size
    fn unmanifested_staleness(&self) -> Option<&'static str> {
        let docs = match count_records(&self.paths.docs) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable pair store");
                return Some("pair store unreadable");
            }
        };
        let vectors = match FlatIndex::load(&self.paths.index) {
            Ok(index) => index.len(),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable vector index");
                return Some("vector index unreadable");
            }
        };

        if docs == vectors {
            None
        } else {
            tracing::warn!(docs, vectors, "pair store and vector index disagree");
            Some("artifacts out of step")
        }
    }

    fn corpus_fingerprint(&self) -> Result<String> {
        fingerprint(&corpus::corpus_files(&self.corpus)?)
    }

    /// Ingest the corpus, embed every client utterance and write the artifacts
    ///
    /// Nothing is written until all embeddings succeed. The old manifest is
    /// removed, then the pair store is committed, then the vector index,
    /// then the new manifest.
    ///
    /// # Errors
    ///
    /// Returns error if ingestion fails, produces no pairs, or embedding fails
    pub async fn build(&self) -> Result<BuildReport> {
        std::fs::create_dir_all(&self.paths.dir)?;

        let pairs = corpus::collect_pairs(&self.corpus)?;
        if pairs.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let corpus_fingerprint = self.corpus_fingerprint()?;

        let vectors = self.embed_queries(&pairs).await?;
        let dimension = vectors.first().map_or(0, Vec::len);
        if dimension == 0 {
            return Err(Error::Embedding("embedding service returned empty vectors".to_string()));
        }

        let mut index = FlatIndex::new(dimension);
        for vector in &vectors {
            index.add(vector)?;
        }

        let mut docs = String::new();
        for pair in &pairs {
            docs.push_str(&serde_json::to_string(pair)?);
            docs.push('\n');
        }

        let manifest = Manifest {
            format_version: MANIFEST_VERSION,
            embed_model: self.embedder.model().to_string(),
            dimension,
            pair_count: pairs.len(),
            corpus_fingerprint,
            built_at: Utc::now(),
        };

        // A manifest must never vouch for a half-written pair of artifacts
        if self.paths.manifest.exists() {
            std::fs::remove_file(&self.paths.manifest)?;
        }
        write_atomic(&self.paths.docs, docs.as_bytes())?;
        index.save(&self.paths.index)?;
        write_atomic(&self.paths.manifest, manifest.to_json()?.as_bytes())?;

        tracing::info!(
            docs = %self.paths.docs.display(),
            index = %self.paths.index.display(),
            pairs = pairs.len(),
            dimension,
            "index built"
        );

        Ok(BuildReport {
            pairs: pairs.len(),
            dimension,
        })
    }

    /// Embed client utterances in batches, preserving pair order
    async fn embed_queries(&self, pairs: &[Pair]) -> Result<Vec<Vec<f32>>> {
        let total = pairs.len();
        let embedder = self.embedder.as_ref();

        let batches: Vec<Vec<Vec<f32>>> = futures::stream::iter(pairs.chunks(EMBED_BATCH_SIZE))
            .enumerate()
            .map(|(i, batch)| async move {
                let texts: Vec<&str> = batch.iter().map(|p| p.query.as_str()).collect();
                let vectors = embed_normalized(embedder, &texts).await?;
                let done = (i * EMBED_BATCH_SIZE + batch.len()).min(total);
                tracing::info!("embedded {done}/{total}");
                Ok::<_, Error>(vectors)
            })
            .buffered(EMBED_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }
}

/// Non-blank lines of a pair store
fn count_records(path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().filter(|l| !l.trim().is_empty()).count())
}
