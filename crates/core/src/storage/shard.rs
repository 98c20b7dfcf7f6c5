//! An immutable shard: packed vectors plus their positional metadata.

use crate::document::Record;
use crate::error::{EngineError, Result};
use crate::quantization::{score, PackedMatrix};
use crate::search::SearchResult;
use crate::storage::persistence;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Packed vectors and metadata kept in lock-step: `records[i]` describes row `i`.
///
/// Never mutated after construction. Replacing a shard means building a new
/// value and swapping it in.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard {
    vectors: PackedMatrix,
    records: Vec<Record>,
    /// Global corpus row of local row 0.
    row_offset: usize,
}

/// Summary of a build.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub rows: usize,
    pub dimension: usize,
    pub row_width: usize,
    pub float_bytes: usize,
    pub packed_bytes: usize,
    /// Float bytes per packed byte (32.0 when `dimension` is a multiple of 8).
    pub compression_ratio: f64,
}

impl Shard {
    /// Pairs packed vectors with metadata. Fails if the counts differ.
    pub fn new(vectors: PackedMatrix, records: Vec<Record>) -> Result<Self> {
        if vectors.rows() != records.len() {
            return Err(EngineError::ShapeMismatch {
                vectors: vectors.rows(),
                records: records.len(),
            });
        }
        Ok(Self {
            vectors,
            records,
            row_offset: 0,
        })
    }

    /// Packs `embeddings` (each `dimension` floats) and pairs them with `records`.
    pub fn build<E: AsRef<[f32]>>(
        embeddings: &[E],
        records: Vec<Record>,
        dimension: usize,
    ) -> Result<(Self, BuildReport)> {
        if embeddings.len() != records.len() {
            return Err(EngineError::ShapeMismatch {
                vectors: embeddings.len(),
                records: records.len(),
            });
        }
        let vectors = PackedMatrix::pack_rows(embeddings, dimension)?;

        let rows = vectors.rows();
        let row_width = vectors.row_width();
        let compression_ratio = if row_width == 0 {
            0.0
        } else {
            (dimension * 4) as f64 / row_width as f64
        };
        let report = BuildReport {
            rows,
            dimension,
            row_width,
            float_bytes: rows * dimension * 4,
            packed_bytes: rows * row_width,
            compression_ratio,
        };
        tracing::info!(
            rows,
            dimension,
            row_width,
            "Built binary shard: {:.1}x compression ({} -> {} bytes)",
            compression_ratio,
            report.float_bytes,
            report.packed_bytes
        );
        Ok((
            Self {
                vectors,
                records,
                row_offset: 0,
            },
            report,
        ))
    }

    /// Reads a vectors artifact and its metadata artifact.
    ///
    /// Missing files are `CorpusNotFound`; unreadable files or differing row
    /// counts are `CorpusCorrupt`.
    pub fn load(vectors_path: &Path, metadata_path: &Path) -> Result<Self> {
        let vectors = persistence::read_vectors(vectors_path)?;
        let records = persistence::read_metadata(metadata_path)?;
        if vectors.rows() != records.len() {
            return Err(EngineError::corrupt(
                metadata_path,
                format!(
                    "{} metadata records for {} packed vectors in {:?}",
                    records.len(),
                    vectors.rows(),
                    vectors_path
                ),
            ));
        }
        Ok(Self {
            vectors,
            records,
            row_offset: 0,
        })
    }

    /// Writes both artifacts atomically.
    pub fn save(&self, vectors_path: &Path, metadata_path: &Path) -> Result<()> {
        persistence::write_vectors(vectors_path, &self.vectors)?;
        persistence::write_metadata(metadata_path, &self.records)
    }

    /// Copy of rows `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.len());
        let start = start.min(end);
        Self {
            vectors: self.vectors.slice_rows(start, end),
            records: self.records[start..end].to_vec(),
            row_offset: self.row_offset + start,
        }
    }

    /// Same shard, numbered from global row `offset`.
    ///
    /// Only affects the fallback `record_id` of records without an `id` field.
    pub fn with_row_offset(mut self, offset: usize) -> Self {
        self.row_offset = offset;
        self
    }

    pub fn row_offset(&self) -> usize {
        self.row_offset
    }

    /// Renders row `index` at Hamming `distance` from the query.
    ///
    /// A record without an `id` is identified by its global row.
    pub fn result_at(&self, index: usize, distance: u32) -> SearchResult {
        let record = &self.records[index];
        SearchResult {
            index,
            record_id: record.record_id(self.row_offset + index),
            score: score(distance, self.dimension()),
            distance,
            metadata: record.clone(),
            text_preview: record.text_preview(),
        }
    }

    pub fn vectors(&self) -> &PackedMatrix {
        &self.vectors
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn row_width(&self) -> usize {
        self.vectors.row_width()
    }

    /// Bit width `D = row_width * 8` used for scoring.
    pub fn dimension(&self) -> usize {
        self.vectors.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::from_pairs([("id", json!(format!("doc-{i}")))]))
            .collect()
    }

    #[test]
    fn test_build_shape_mismatch() {
        let err = Shard::build(&vec![vec![1.0f32; 8]; 3], records(2), 8).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ShapeMismatch {
                vectors: 3,
                records: 2
            }
        ));
    }

    #[test]
    fn test_build_report() {
        let (shard, report) = Shard::build(&vec![vec![0.5f32; 384]; 10], records(10), 384).unwrap();
        assert_eq!(shard.len(), 10);
        assert_eq!(report.row_width, 48);
        assert_eq!(report.packed_bytes, 480);
        assert_eq!(report.compression_ratio, 32.0);
        assert_eq!(shard.dimension(), 384);
    }

    #[test]
    fn test_save_load() {
        let dir = TempDir::new().unwrap();
        let v = dir.path().join("shard_0.bqv");
        let m = dir.path().join("shard_0_meta.json");
        let (shard, _) = Shard::build(&vec![vec![-0.5f32; 16]; 4], records(4), 16).unwrap();
        shard.save(&v, &m).unwrap();
        assert_eq!(Shard::load(&v, &m).unwrap(), shard);
    }

    #[test]
    fn test_load_row_count_mismatch_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let v = dir.path().join("v.bqv");
        let m = dir.path().join("m.json");
        let (shard, _) = Shard::build(&vec![vec![1.0f32; 16]; 4], records(4), 16).unwrap();
        shard.save(&v, &m).unwrap();
        persistence::write_metadata(&m, &records(3)).unwrap();
        assert!(matches!(
            Shard::load(&v, &m),
            Err(EngineError::CorpusCorrupt { .. })
        ));
    }

    #[test]
    fn test_load_missing_metadata() {
        let dir = TempDir::new().unwrap();
        let v = dir.path().join("v.bqv");
        let (shard, _) = Shard::build(&vec![vec![1.0f32; 16]; 1], records(1), 16).unwrap();
        shard.save(&v, &dir.path().join("m.json")).unwrap();
        assert!(matches!(
            Shard::load(&v, &dir.path().join("other.json")),
            Err(EngineError::CorpusNotFound { .. })
        ));
    }

    #[test]
    fn test_result_at() {
        let recs = vec![Record::from_pairs([
            ("id", json!("x1")),
            ("abstract", json!("binary codes")),
        ])];
        let (shard, _) = Shard::build(&[vec![1.0f32; 8]], recs, 8).unwrap();
        let r = shard.result_at(0, 2);
        assert_eq!(r.record_id, "x1");
        assert_eq!(r.score, 0.75);
        assert_eq!(r.text_preview, "binary codes");
    }

    #[test]
    fn test_slice_keeps_lock_step() {
        let embeddings: Vec<Vec<f32>> = (0..6)
            .map(|i| (0..8).map(|j| if j == i { 1.0 } else { -1.0 }).collect())
            .collect();
        let (shard, _) = Shard::build(&embeddings, records(6), 8).unwrap();
        let part = shard.slice(2, 4);
        assert_eq!(part.len(), 2);
        assert_eq!(part.records()[0].record_id(0), "doc-2");
        assert_eq!(part.vectors().row(0), shard.vectors().row(2));
        assert_eq!(part.row_offset(), 2);
    }

    #[test]
    fn test_fallback_record_id_is_global_row() {
        let embeddings = vec![vec![1.0f32; 8]; 3];
        let anonymous = vec![Record::default(); 3];
        let (shard, _) = Shard::build(&embeddings, anonymous, 8).unwrap();
        assert_eq!(shard.result_at(1, 0).record_id, "1");

        let shard = shard.with_row_offset(40);
        let r = shard.result_at(1, 0);
        assert_eq!(r.record_id, "41");
        assert_eq!(r.index, 1);
        assert_eq!(shard.slice(2, 3).result_at(0, 0).record_id, "42");
    }
}
