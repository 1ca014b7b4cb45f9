use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector has dimension {got}, index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("failed to persist index to {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load index from {path}: {message}")]
    Load { path: String, message: String },
}

/// Flat squared-L2 nearest-neighbor index.
///
/// Vectors are appended and never reordered: position n always refers to the
/// n-th vector ever added, which is the join key back to the document store's
/// `global_ordinal` column. Exact search keeps the structure trivially
/// serializable; corpora here are county-records sized, not web-sized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors stored; also the ordinal the next `add` assigns.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors in order. The i-th input gets ordinal `len() + i`.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), IndexError> {
        for v in vectors {
            if v.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    got: v.len(),
                });
            }
        }
        for v in vectors {
            self.data.extend_from_slice(v);
        }
        Ok(())
    }

    /// Exact k-nearest search, ascending by squared L2 distance.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        let mut hits: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(ordinal, row)| {
                let dist = row
                    .iter()
                    .zip(query)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>();
                (ordinal, dist)
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits)
    }

    /// Snapshot the full index to disk so restarts skip re-embedding.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let json = serde_json::to_vec(self).map_err(|e| IndexError::Persist {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        // Write-then-rename so a crash mid-write leaves the old snapshot intact.
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| IndexError::Persist {
            path: path.display().to_string(),
            source: e,
        })?;
        std::fs::rename(&tmp, path).map_err(|e| IndexError::Persist {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let bytes = std::fs::read(path).map_err(|e| IndexError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let index: VectorIndex =
            serde_json::from_slice(&bytes).map_err(|e| IndexError::Load {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        if index.dimension == 0 || index.data.len() % index.dimension != 0 {
            return Err(IndexError::Load {
                path: path.display().to_string(),
                message: format!(
                    "corrupt snapshot: {} floats for dimension {}",
                    index.data.len(),
                    index.dimension
                ),
            });
        }
        Ok(index)
    }
}

/// Encode a vector as little-endian f32 bytes for the chunk table BLOB.
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn vector_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
