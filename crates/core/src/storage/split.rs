//! Contiguous corpus partitioning and per-shard artifact layout.
//!
//! Row `i` of a corpus of `total` rows split `n` ways belongs to shard
//! `i / ceil(total / n)`. Boundaries are fixed at split time and recorded in
//! `manifest.json` next to the shard artifacts.

use crate::config::MANIFEST_FILE;
use crate::document::Record;
use crate::error::{EngineError, Result};
use crate::quantization::PackedMatrix;
use crate::storage::persistence;
use crate::storage::shard::Shard;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Row ranges for splitting `total` rows into at most `shards` contiguous shards.
///
/// Every range except possibly the last has `ceil(total / shards)` rows.
/// Trailing shards that would be empty are not produced.
pub fn shard_ranges(total: usize, shards: usize) -> Result<Vec<Range<usize>>> {
    if shards == 0 {
        return Err(EngineError::InvalidArgument(
            "shard count must be at least 1".into(),
        ));
    }
    let size = total.div_ceil(shards).max(1);
    Ok((0..shards)
        .map(|i| i * size)
        .take_while(|&start| start < total)
        .map(|start| start..(start + size).min(total))
        .collect())
}

/// Shard that owns `row`, or `None` when `row` is out of range or `shards` is zero.
pub fn shard_for_row(row: usize, total: usize, shards: usize) -> Option<usize> {
    if shards == 0 || row >= total {
        return None;
    }
    Some(row / total.div_ceil(shards))
}

/// File names of shard `shard_id`'s vectors and metadata artifacts.
pub fn shard_file_names(shard_id: u32) -> (String, String) {
    (
        format!("shard_{shard_id}.bqv"),
        format!("shard_{shard_id}_meta.json"),
    )
}

/// Paths of shard `shard_id`'s artifacts in `dir`.
///
/// Prefers `shard_{i}.bqv`; falls back to a NumPy `shard_{i}.npy` when only that exists.
pub fn shard_paths(dir: &Path, shard_id: u32) -> (PathBuf, PathBuf) {
    let (vectors, metadata) = shard_file_names(shard_id);
    let mut vectors_path = dir.join(vectors);
    if !vectors_path.exists() {
        let npy = dir.join(format!("shard_{shard_id}.npy"));
        if npy.exists() {
            vectors_path = npy;
        }
    }
    (vectors_path, dir.join(metadata))
}

/// One shard's boundaries as recorded at split time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub shard_id: u32,
    /// First global row (inclusive).
    pub start: usize,
    /// Last global row (exclusive).
    pub end: usize,
    pub rows: usize,
    pub row_width: usize,
}

/// Layout of a split corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardManifest {
    pub total_rows: usize,
    pub requested_shards: usize,
    pub shards: Vec<ManifestEntry>,
}

impl ShardManifest {
    /// Reads `manifest.json` from `dir`. A missing manifest is `Ok(None)`.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| EngineError::corrupt(path, e.to_string()))
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;
        persistence::atomic_write(&dir.join(MANIFEST_FILE), &bytes)?;
        Ok(())
    }

    pub fn entry(&self, shard_id: u32) -> Option<&ManifestEntry> {
        self.shards.iter().find(|e| e.shard_id == shard_id)
    }
}

/// Splits a packed corpus into `shards` contiguous shards written under `out_dir`.
///
/// Writes `shard_{i}.bqv` and `shard_{i}_meta.json` per shard plus `manifest.json`.
pub fn split_corpus(
    vectors: PackedMatrix,
    records: Vec<Record>,
    shards: usize,
    out_dir: &Path,
) -> Result<ShardManifest> {
    let corpus = Shard::new(vectors, records)?;
    let ranges = shard_ranges(corpus.len(), shards)?;
    std::fs::create_dir_all(out_dir)?;

    let mut entries = Vec::with_capacity(ranges.len());
    for (i, range) in ranges.into_iter().enumerate() {
        let shard_id = i as u32;
        let part = corpus.slice(range.start, range.end);
        let (vectors_file, metadata_file) = shard_file_names(shard_id);
        part.save(&out_dir.join(vectors_file), &out_dir.join(metadata_file))?;

        tracing::info!(
            shard_id,
            start = range.start,
            end = range.end,
            rows = part.len(),
            "Wrote shard"
        );
        entries.push(ManifestEntry {
            shard_id,
            start: range.start,
            end: range.end,
            rows: part.len(),
            row_width: part.row_width(),
        });
    }

    let manifest = ShardManifest {
        total_rows: corpus.len(),
        requested_shards: shards,
        shards: entries,
    };
    manifest.save(out_dir)?;
    Ok(manifest)
}
