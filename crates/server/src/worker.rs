//! Shard worker: owns one [`BinaryIndex`] and its load lifecycle.
//!
//! State moves `Unloaded → Loading → Ready` on the first successful load. A
//! failed first load returns to `Unloaded` and searches keep failing with
//! `NotLoaded` until an operator retries. A reload of a `Ready` worker builds
//! a fresh shard and swaps it in, so the worker stays `Ready` and keeps
//! serving throughout; if the reload fails the previous shard stays in place.

use crate::api::metrics;
use bitshard_core::backend::BackendContext;
use bitshard_core::search::SearchResult;
use bitshard_core::storage::{shard_paths, ManifestEntry, ShardManifest};
use bitshard_core::{BinaryIndex, EngineError, IndexStats};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Lifecycle of a shard worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Unloaded,
    Loading,
    Ready,
}

/// One shard's search service.
pub struct ShardWorker {
    shard_id: u32,
    data_dir: PathBuf,
    index: Arc<BinaryIndex>,
    state: RwLock<WorkerState>,
    range: RwLock<Option<ManifestEntry>>,
    load_lock: tokio::sync::Mutex<()>,
}

impl ShardWorker {
    pub fn new(shard_id: u32, data_dir: impl Into<PathBuf>, index: BinaryIndex) -> Self {
        Self {
            shard_id,
            data_dir: data_dir.into(),
            index: Arc::new(index),
            state: RwLock::new(WorkerState::Unloaded),
            range: RwLock::new(None),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Worker with a host-detected backend.
    pub fn with_backend(
        shard_id: u32,
        data_dir: impl Into<PathBuf>,
        backend: BackendContext,
        dimension: usize,
    ) -> Self {
        Self::new(shard_id, data_dir, BinaryIndex::new(backend, dimension))
    }

    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == WorkerState::Ready
    }

    /// Global row range from the split manifest, if one was found.
    pub fn range(&self) -> Option<ManifestEntry> {
        self.range.read().clone()
    }

    pub fn vectors(&self) -> usize {
        self.index.len()
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// Loads (or reloads) this worker's shard artifacts from the data directory.
    ///
    /// Concurrent calls are serialized. File reads and CRC checks run on the
    /// blocking pool.
    pub async fn load(&self) -> Result<usize, EngineError> {
        let _guard = self.load_lock.lock().await;
        {
            let mut state = self.state.write();
            if *state != WorkerState::Ready {
                *state = WorkerState::Loading;
            }
        }
        tracing::info!(shard_id = self.shard_id, data_dir = ?self.data_dir, "Loading shard");

        let index = Arc::clone(&self.index);
        let dir = self.data_dir.clone();
        let shard_id = self.shard_id;
        let outcome = tokio::task::spawn_blocking(move || {
            let range = match ShardManifest::load(&dir) {
                Ok(manifest) => manifest.and_then(|m| m.entry(shard_id).cloned()),
                Err(e) => {
                    tracing::warn!(shard_id, error = %e, "Ignoring unreadable shard manifest");
                    None
                }
            };
            let (vectors_path, metadata_path) = shard_paths(&dir, shard_id);
            let row_offset = range.as_ref().map_or(0, |entry| entry.start);
            let rows = index.load_at(&vectors_path, &metadata_path, row_offset)?;
            Ok::<_, EngineError>((rows, range))
        })
        .await
        .map_err(|e| EngineError::Io(std::io::Error::other(e.to_string())))
        .and_then(|r| r);

        match outcome {
            Ok((rows, range)) => {
                if let Some(entry) = &range {
                    if entry.rows != rows {
                        tracing::warn!(
                            shard_id,
                            manifest_rows = entry.rows,
                            rows,
                            "Shard row count differs from manifest"
                        );
                    }
                }
                *self.range.write() = range;
                *self.state.write() = WorkerState::Ready;
                metrics::set_shard_vectors(shard_id, rows);
                tracing::info!(shard_id, rows, state = ?WorkerState::Ready, "Shard ready");
                Ok(rows)
            }
            Err(e) => {
                let mut state = self.state.write();
                *state = if self.index.is_ready() {
                    WorkerState::Ready
                } else {
                    WorkerState::Unloaded
                };
                tracing::error!(shard_id, error = %e, state = ?*state, "Shard load failed");
                Err(e)
            }
        }
    }

    /// Searches the loaded shard. Fails with `NotLoaded` unless `Ready`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, EngineError> {
        if !self.is_ready() {
            return Err(EngineError::NotLoaded);
        }
        self.index.search(query, k)
    }
}
