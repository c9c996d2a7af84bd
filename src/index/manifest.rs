//! Build manifest recorded next to the index artifacts
//!
//! Lets `ensure` notice a changed corpus or embedding model instead of
//! trusting file presence alone.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Result;

/// Current manifest layout
pub const MANIFEST_VERSION: u32 = 1;

/// Metadata describing one index build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub embed_model: String,
    pub dimension: usize,
    pub pair_count: usize,
    pub corpus_fingerprint: String,
    pub built_at: DateTime<Utc>,
}

impl Manifest {
    /// Read a manifest, `Ok(None)` if the file does not exist
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Serialize as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Hash the relative paths and contents of every corpus file
///
/// Each entry pairs a corpus-relative key with the file to read. Only the
/// key enters the hash, so moving the corpus directory does not invalidate
/// an index.
///
/// # Errors
///
/// Returns error if a file cannot be read
pub fn fingerprint<K: AsRef<str>, P: AsRef<Path>>(files: &[(K, P)]) -> Result<String> {
    let mut hasher = Sha256::new();
    for (key, path) in files {
        let content = std::fs::read(path)?;

        hasher.update(key.as_ref().as_bytes());
        hasher.update([0]);
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(&content);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Replace `path` with `bytes` via a temp file in the same directory
///
/// # Errors
///
/// Returns error if the temp file cannot be written or renamed
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
