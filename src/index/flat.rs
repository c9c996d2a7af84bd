//! Flat inner-product vector index
//!
//! Vectors are stored contiguously and searched exhaustively. Callers add
//! unit-length vectors, so the inner product is the cosine similarity.
//!
//! On-disk layout (little endian):
//!
//! ```text
//! magic "BPFI" | version u32 | dimension u32 | count u64 | count * dimension f32
//! ```

use std::path::Path;

use super::manifest::write_atomic;
use crate::{Error, Result};

const MAGIC: &[u8; 4] = b"BPFI";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Index position reported for result slots that could not be filled
pub const MISSING: i64 = -1;

/// One search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Inner product with the query
    pub score: f32,
    /// Insertion position, or [`MISSING`]
    pub index: i64,
}

/// Exhaustive inner-product index
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index for vectors of `dimension` components
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors
    #[must_use]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one vector
    ///
    /// # Errors
    ///
    /// Returns error if the vector length does not match the index dimension
    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::Index(format!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimension
            )));
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Vector at `position`
    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        let end = start.checked_add(self.dimension)?;
        self.data.get(start..end)
    }

    /// Return the `n` best matches, highest score first
    ///
    /// Ties keep insertion order. When `n` exceeds the number of stored
    /// vectors the remaining slots are [`MISSING`]. A query of the wrong
    /// dimension matches nothing.
    #[must_use]
    pub fn search(&self, query: &[f32], n: usize) -> Vec<Neighbor> {
        if n == 0 || query.len() != self.dimension || self.dimension == 0 {
            return Vec::new();
        }

        let mut scored: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(i, v)| Neighbor {
                score: dot(v, query),
                #[allow(clippy::cast_possible_wrap)]
                index: i as i64,
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
        scored.truncate(n);

        while scored.len() < n {
            scored.push(Neighbor {
                score: f32::NEG_INFINITY,
                index: MISSING,
            });
        }

        scored
    }

    /// Serialize the index
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        #[allow(clippy::cast_possible_truncation)]
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        bytes.extend(self.data.iter().flat_map(|f| f.to_le_bytes()));
        bytes
    }

    /// Deserialize an index written by [`FlatIndex::to_bytes`]
    ///
    /// # Errors
    ///
    /// Returns error if the header is invalid or the payload is truncated
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err(Error::Index("not a flat index file".to_string()));
        }

        let version = read_u32(&bytes[4..8]);
        if version != FORMAT_VERSION {
            return Err(Error::Index(format!("unsupported index version {version}")));
        }

        let dimension = read_u32(&bytes[8..12]) as usize;
        let count = usize::try_from(read_u64(&bytes[12..20]))
            .map_err(|_| Error::Index("vector count overflow".to_string()))?;

        let payload = &bytes[HEADER_LEN..];
        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| Error::Index("index size overflow".to_string()))?;
        if payload.len() != expected {
            return Err(Error::Index(format!(
                "index payload is {} bytes, header promises {expected}",
                payload.len()
            )));
        }

        let data = payload
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self { dimension, data })
    }

    /// Write the index atomically to `path`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_bytes())
    }

    /// Read an index file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not a valid index
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn read_u32(bytes: &[u8]) -> u32 {
    let arr: [u8; 4] = bytes.try_into().unwrap_or([0; 4]);
    u32::from_le_bytes(arr)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let arr: [u8; 8] = bytes.try_into().unwrap_or([0; 8]);
    u64::from_le_bytes(arr)
}
