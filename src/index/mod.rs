use crate::error::{ApiError, Result};
use crate::models::{Book, SearchHit};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

/// Flat brute-force L2 index over dense vectors with a parallel metadata
/// list.
///
/// The load-bearing contract: position `i` in the vector store always
/// corresponds to position `i` in the metadata list, and the two grow in
/// lock-step. Rows are only ever appended, never reordered in place.
/// Brute-force scan is fine at catalog scale (thousands of items).
#[derive(Debug)]
pub struct VectorIndex {
    dim: usize,
    // Row-major storage: vectors.len() == len() * dim.
    vectors: Vec<f32>,
    metadata: Vec<Book>,
}

/// On-disk form of the vector half of the index. The metadata half is a
/// companion JSON file; the two are always written and read together.
#[derive(Serialize, Deserialize)]
struct PersistedVectors {
    dim: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Read-only view of all metadata entries, in insertion order.
    pub fn all_metadata(&self) -> &[Book] {
        &self.metadata
    }

    /// Append vectors and their metadata. Validates everything up front so
    /// the append is all-or-nothing: on error neither store has grown.
    pub fn add(&mut self, vectors: &[Vec<f32>], metas: Vec<Book>) -> Result<()> {
        if vectors.len() != metas.len() {
            return Err(ApiError::LengthMismatch {
                vectors: vectors.len(),
                metas: metas.len(),
            });
        }

        for v in vectors {
            if v.len() != self.dim {
                return Err(ApiError::DimensionMismatch {
                    expected: self.dim,
                    got: v.len(),
                });
            }
        }

        for v in vectors {
            self.vectors.extend_from_slice(v);
        }
        self.metadata.extend(metas);

        debug!("Index now holds {} vectors", self.len());
        Ok(())
    }

    /// Return up to `k` nearest neighbors by L2 distance, nearest first.
    /// Fewer than `k` hits come back when the index is smaller; an empty
    /// index yields an empty list.
    pub fn search(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if vector.len() != self.dim {
            return Err(ApiError::DimensionMismatch {
                expected: self.dim,
                got: vector.len(),
            });
        }

        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(i, row)| (i, l2_distance(row, vector)))
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        // A row index past the metadata list would mean the lock-step
        // invariant broke; drop such rows rather than surface them.
        Ok(scored
            .into_iter()
            .filter(|(i, _)| *i < self.metadata.len())
            .map(|(i, distance)| SearchHit {
                book: self.metadata[i].clone(),
                distance,
            })
            .collect())
    }

    /// Persist the vector blob and the metadata list as companion artifacts.
    pub fn save(&self, index_path: impl AsRef<Path>, meta_path: impl AsRef<Path>) -> Result<()> {
        let index_path = index_path.as_ref();
        let meta_path = meta_path.as_ref();

        if let Some(parent) = index_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if let Some(parent) = meta_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let persisted = PersistedVectors {
            dim: self.dim,
            data: self.vectors.clone(),
        };
        let mut writer = BufWriter::new(File::create(index_path)?);
        bincode::serialize_into(&mut writer, &persisted)
            .map_err(|e| ApiError::InternalError(format!("failed to write vector blob: {}", e)))?;

        let meta_writer = BufWriter::new(File::create(meta_path)?);
        serde_json::to_writer(meta_writer, &self.metadata)
            .map_err(|e| ApiError::InternalError(format!("failed to write metadata: {}", e)))?;

        info!(
            "Saved index ({} vectors, dim {}) to {} / {}",
            self.len(),
            self.dim,
            index_path.display(),
            meta_path.display()
        );
        Ok(())
    }

    /// Restore an index from its two companion artifacts. Loading fails if
    /// either file is missing, if deserialization fails, or if the vector
    /// count and metadata count disagree.
    pub fn load(index_path: impl AsRef<Path>, meta_path: impl AsRef<Path>) -> Result<Self> {
        let index_path = index_path.as_ref();
        let meta_path = meta_path.as_ref();

        if !index_path.exists() {
            return Err(ApiError::ArtifactNotFound(index_path.display().to_string()));
        }
        if !meta_path.exists() {
            return Err(ApiError::ArtifactNotFound(meta_path.display().to_string()));
        }

        let reader = BufReader::new(File::open(index_path)?);
        let persisted: PersistedVectors = bincode::deserialize_from(reader)
            .map_err(|e| ApiError::CorruptArtifact(format!("vector blob: {}", e)))?;

        if persisted.dim == 0 || persisted.data.len() % persisted.dim != 0 {
            return Err(ApiError::CorruptArtifact(format!(
                "vector blob length {} is not a multiple of dim {}",
                persisted.data.len(),
                persisted.dim
            )));
        }

        let meta_reader = BufReader::new(File::open(meta_path)?);
        let metadata: Vec<Book> = serde_json::from_reader(meta_reader)
            .map_err(|e| ApiError::CorruptArtifact(format!("metadata list: {}", e)))?;

        let vector_count = persisted.data.len() / persisted.dim;
        if vector_count != metadata.len() {
            return Err(ApiError::CorruptArtifact(format!(
                "artifact lengths disagree: {} vectors, {} metadata entries",
                vector_count,
                metadata.len()
            )));
        }

        info!(
            "Loaded index ({} vectors, dim {}) from {}",
            metadata.len(),
            persisted.dim,
            index_path.display()
        );

        Ok(Self {
            dim: persisted.dim,
            vectors: persisted.data,
            metadata,
        })
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(title: &str) -> Book {
        serde_json::from_str(&format!(r#"{{"title": "{}"}}"#, title)).unwrap()
    }

    #[test]
    fn test_add_keeps_vectors_and_metadata_aligned() {
        let mut index = VectorIndex::new(3);
        index
            .add(&[vec![1.0, 0.0, 0.0]], vec![book("A")])
            .unwrap();
        index
            .add(
                &[vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]],
                vec![book("B"), book("C")],
            )
            .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.vectors.len(), 3 * index.dim());
    }

    #[test]
    fn test_add_rejects_dimension_mismatch() {
        let mut index = VectorIndex::new(3);
        let err = index.add(&[vec![1.0, 0.0]], vec![book("A")]).unwrap_err();
        assert!(matches!(err, ApiError::DimensionMismatch { .. }));
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_add_rejects_length_mismatch_without_partial_append() {
        let mut index = VectorIndex::new(2);
        let err = index
            .add(&[vec![1.0, 0.0], vec![0.0, 1.0]], vec![book("A")])
            .unwrap_err();
        assert!(matches!(err, ApiError::LengthMismatch { .. }));
        assert_eq!(index.len(), 0);
        assert!(index.vectors.is_empty());
    }

    #[test]
    fn test_bad_row_does_not_append_earlier_rows() {
        let mut index = VectorIndex::new(2);
        let err = index
            .add(
                &[vec![1.0, 0.0], vec![1.0, 0.0, 0.0]],
                vec![book("A"), book("B")],
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::DimensionMismatch { .. }));
        assert_eq!(index.len(), 0);
        assert!(index.vectors.is_empty());
    }

    #[test]
    fn test_search_orders_by_ascending_distance() {
        let mut index = VectorIndex::new(2);
        index
            .add(
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.9, 0.1]],
                vec![book("East"), book("North"), book("NearEast")],
            )
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].book.title.as_deref(), Some("East"));
        assert_eq!(hits[1].book.title.as_deref(), Some("NearEast"));
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_search_never_returns_more_than_k() {
        let mut index = VectorIndex::new(2);
        index
            .add(
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]],
                vec![book("A"), book("B"), book("C")],
            )
            .unwrap();

        assert_eq!(index.search(&[1.0, 0.0], 2).unwrap().len(), 2);
        assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn test_search_empty_index_returns_empty() {
        let index = VectorIndex::new(4);
        assert!(index.search(&[0.0, 0.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("vector_index.bin");
        let meta_path = dir.path().join("metadata.json");

        let mut index = VectorIndex::new(2);
        index
            .add(
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
                vec![book("A"), book("B")],
            )
            .unwrap();
        index.save(&index_path, &meta_path).unwrap();

        let loaded = VectorIndex::load(&index_path, &meta_path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dim(), 2);

        let hits = loaded.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].book.title.as_deref(), Some("A"));
    }

    #[test]
    fn test_load_fails_when_companion_artifact_missing() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("vector_index.bin");
        let meta_path = dir.path().join("metadata.json");

        let mut index = VectorIndex::new(2);
        index.add(&[vec![1.0, 0.0]], vec![book("A")]).unwrap();
        index.save(&index_path, &meta_path).unwrap();
        std::fs::remove_file(&meta_path).unwrap();

        let err = VectorIndex::load(&index_path, &meta_path).unwrap_err();
        assert!(matches!(err, ApiError::ArtifactNotFound(_)));
    }

    #[test]
    fn test_load_fails_when_artifact_lengths_disagree() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("vector_index.bin");
        let meta_path = dir.path().join("metadata.json");

        let mut index = VectorIndex::new(2);
        index
            .add(
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
                vec![book("A"), book("B")],
            )
            .unwrap();
        index.save(&index_path, &meta_path).unwrap();

        // Overwrite the metadata artifact with a shorter list.
        std::fs::write(&meta_path, r#"[{"title": "A"}]"#).unwrap();

        let err = VectorIndex::load(&index_path, &meta_path).unwrap_err();
        assert!(matches!(err, ApiError::CorruptArtifact(_)));
    }

    #[test]
    fn test_load_fails_on_garbage_blob() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("vector_index.bin");
        let meta_path = dir.path().join("metadata.json");

        std::fs::write(&index_path, b"not a vector blob").unwrap();
        std::fs::write(&meta_path, "[]").unwrap();

        let err = VectorIndex::load(&index_path, &meta_path).unwrap_err();
        assert!(matches!(err, ApiError::CorruptArtifact(_)));
    }
}
