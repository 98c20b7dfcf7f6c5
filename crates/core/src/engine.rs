//! The local search engine: one shard, one backend, concurrent readers.
//!
//! [`BinaryIndex`] holds its shard behind `RwLock<Option<Arc<Shard>>>`. The
//! lock is only taken long enough to clone the `Arc`, so searches never hold it
//! while scanning. `None` means nothing has been loaded yet and every search
//! fails with [`EngineError::NotLoaded`]. Loading builds a fresh [`Shard`] off
//! to the side and swaps it in; in-flight searches finish against the shard
//! they started with.

use crate::backend::{BackendContext, BackendError, CapabilityTier};
use crate::config;
use crate::document::Record;
use crate::error::{EngineError, Result};
use crate::quantization::{pack, packed_width};
use crate::search::SearchResult;
use crate::storage::{BuildReport, Shard};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Binary-quantized flat index over one shard.
pub struct BinaryIndex {
    backend: BackendContext,
    dimension: usize,
    shard: RwLock<Option<Arc<Shard>>>,
    search_count: AtomicU64,
    search_nanos: AtomicU64,
}

/// Running counters and shape of a [`BinaryIndex`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub loaded: bool,
    pub num_vectors: usize,
    /// Bits per vector; the configured dimension until a shard is loaded.
    pub vector_dim: usize,
    pub bytes_per_vector: usize,
    pub backend: String,
    pub capability: CapabilityTier,
    pub native_available: bool,
    pub search_count: u64,
    pub total_search_time_ms: f64,
    pub avg_search_time_ms: f64,
}

/// Host capability and the backend a new index would use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub capability: CapabilityTier,
    pub native_available: bool,
    pub backend: String,
}

impl BackendInfo {
    pub fn from_context(ctx: &BackendContext) -> Self {
        Self {
            capability: ctx.capability(),
            native_available: ctx.native_available(),
            backend: ctx.backend_name().to_string(),
        }
    }
}

impl BinaryIndex {
    /// Empty (not yet loaded) index searching through `backend`.
    ///
    /// `dimension` is only reported until a shard is installed; afterwards the
    /// shard's own bit width is authoritative.
    pub fn new(backend: BackendContext, dimension: usize) -> Self {
        Self {
            backend,
            dimension,
            shard: RwLock::new(None),
            search_count: AtomicU64::new(0),
            search_nanos: AtomicU64::new(0),
        }
    }

    /// Index with a host-detected backend and [`config::DEFAULT_DIMENSION`].
    pub fn with_defaults() -> Self {
        Self::new(BackendContext::detect(), config::DEFAULT_DIMENSION)
    }

    pub fn backend(&self) -> &BackendContext {
        &self.backend
    }

    /// Packs `embeddings`, writes both artifacts, and installs the result.
    ///
    /// The embeddings' own length sets the dimension; an empty batch uses the
    /// configured one.
    pub fn build_and_save<E: AsRef<[f32]>>(
        &self,
        embeddings: &[E],
        records: Vec<Record>,
        vectors_path: &Path,
        metadata_path: &Path,
    ) -> Result<BuildReport> {
        let dimension = embeddings
            .first()
            .map(|e| e.as_ref().len())
            .unwrap_or(self.dimension);
        let (shard, report) = Shard::build(embeddings, records, dimension)?;
        shard.save(vectors_path, metadata_path)?;
        self.swap(shard);
        Ok(report)
    }

    /// Loads a shard from disk into a fresh value and swaps it in.
    ///
    /// On failure the previously installed shard (if any) stays in place.
    pub fn load(&self, vectors_path: &Path, metadata_path: &Path) -> Result<usize> {
        self.load_at(vectors_path, metadata_path, 0)
    }

    /// Like [`load`](Self::load) for a shard whose first row is global row `row_offset`.
    pub fn load_at(
        &self,
        vectors_path: &Path,
        metadata_path: &Path,
        row_offset: usize,
    ) -> Result<usize> {
        let shard = Shard::load(vectors_path, metadata_path)?.with_row_offset(row_offset);
        let rows = shard.len();
        self.swap(shard);
        tracing::info!(rows, dimension = self.dimension(), "Index ready");
        Ok(rows)
    }

    /// Installs `shard`, returning the one it replaced.
    pub fn swap(&self, shard: Shard) -> Option<Arc<Shard>> {
        self.shard.write().replace(Arc::new(shard))
    }

    /// Current shard, shared with any in-flight searches.
    pub fn snapshot(&self) -> Result<Arc<Shard>> {
        self.shard.read().clone().ok_or(EngineError::NotLoaded)
    }

    pub fn is_ready(&self) -> bool {
        self.shard.read().is_some()
    }

    /// Number of vectors in the installed shard (0 when not loaded).
    pub fn len(&self) -> usize {
        self.shard.read().as_ref().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bit width of the installed shard, or the configured dimension.
    pub fn dimension(&self) -> usize {
        self.shard
            .read()
            .as_ref()
            .map_or(self.dimension, |s| s.dimension())
    }

    /// The `k` nearest records to `query`, nearest first.
    ///
    /// `k` is clamped to the corpus size. Ties go to the lower row.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let shard = self.snapshot()?;
        let started = Instant::now();
        let results = self.search_shard(&shard, query, k)?;
        self.record_search(started);
        Ok(results)
    }

    /// Runs [`search`](Self::search) for each query in order against one shard snapshot.
    pub fn search_batch<E: AsRef<[f32]>>(
        &self,
        queries: &[E],
        k: usize,
    ) -> Result<Vec<Vec<SearchResult>>> {
        let shard = self.snapshot()?;
        queries
            .iter()
            .map(|q| {
                let started = Instant::now();
                let results = self.search_shard(&shard, q.as_ref(), k)?;
                self.record_search(started);
                Ok(results)
            })
            .collect()
    }

    fn search_shard(&self, shard: &Shard, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if let Some(pos) = query.iter().position(|x| !x.is_finite()) {
            return Err(EngineError::InvalidArgument(format!(
                "query component {pos} is not finite"
            )));
        }
        if shard.is_empty() {
            return Ok(Vec::new());
        }
        if packed_width(query.len()) != shard.row_width() {
            return Err(EngineError::DimensionMismatch {
                expected: shard.dimension(),
                actual: query.len(),
            });
        }

        let k = k.min(shard.len());
        let packed = pack(query);
        let top = self
            .backend
            .batch_search(&packed, shard.vectors(), k)
            .map_err(|e| match e {
                BackendError::DimensionMismatch { query, row_width } => {
                    EngineError::DimensionMismatch {
                        expected: row_width * 8,
                        actual: query * 8,
                    }
                }
                BackendError::Unavailable(reason) => EngineError::InvalidArgument(reason),
            })?;

        Ok(top
            .iter()
            .map(|(index, distance)| shard.result_at(index, distance))
            .collect())
    }

    fn record_search(&self, started: Instant) {
        let nanos = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.search_count.fetch_add(1, Ordering::Relaxed);
        self.search_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn stats(&self) -> IndexStats {
        let shard = self.shard.read().clone();
        let search_count = self.search_count.load(Ordering::Relaxed);
        let total_ms = self.search_nanos.load(Ordering::Relaxed) as f64 / 1e6;
        let (num_vectors, vector_dim, bytes_per_vector) = match &shard {
            Some(s) => (s.len(), s.dimension(), s.row_width()),
            None => (0, self.dimension, packed_width(self.dimension)),
        };
        IndexStats {
            loaded: shard.is_some(),
            num_vectors,
            vector_dim,
            bytes_per_vector,
            backend: self.backend.backend_name().to_string(),
            capability: self.backend.capability(),
            native_available: self.backend.native_available(),
            search_count,
            total_search_time_ms: total_ms,
            avg_search_time_ms: if search_count == 0 {
                0.0
            } else {
                total_ms / search_count as f64
            },
        }
    }
}

impl std::fmt::Debug for BinaryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryIndex")
            .field("backend", &self.backend)
            .field("vectors", &self.len())
            .finish()
    }
}
