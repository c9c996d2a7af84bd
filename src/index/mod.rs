//! Persisted retrieval index
//!
//! An index directory holds three files that are always written together:
//!
//! - `cbt_docs.jsonl`: one JSON pair record per line
//! - `cbt.index`: unit vectors of each pair's client utterance, same order
//! - `manifest.json`: model and corpus fingerprint of the build

pub mod builder;
pub mod flat;
pub mod manifest;

use std::path::{Path, PathBuf};

pub use builder::{BuildReport, EMBED_BATCH_SIZE, EnsureOutcome, IndexBuilder};
pub use flat::{FlatIndex, MISSING, Neighbor};
pub use manifest::Manifest;

/// Pair store file name
pub const DOCS_FILE: &str = "cbt_docs.jsonl";

/// Vector index file name
pub const INDEX_FILE: &str = "cbt.index";

/// Build manifest file name
pub const MANIFEST_FILE: &str = "manifest.json";

/// Locations of the artifacts inside an index directory
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub dir: PathBuf,
    pub docs: PathBuf,
    pub index: PathBuf,
    pub manifest: PathBuf,
}

impl IndexPaths {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        Self {
            docs: dir.join(DOCS_FILE),
            index: dir.join(INDEX_FILE),
            manifest: dir.join(MANIFEST_FILE),
            dir,
        }
    }

    /// Whether both the pair store and the vector index exist
    #[must_use]
    pub fn artifacts_exist(&self) -> bool {
        self.docs.exists() && self.index.exists()
    }
}
