//! Typed failures returned by the local engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by build, load, and search operations.
///
/// Input errors (`ShapeMismatch`, `DimensionMismatch`, `InvalidArgument`) are the
/// caller's fault. State errors (`NotLoaded`, `CorpusNotFound`, `CorpusCorrupt`)
/// describe the engine or its artifacts. Native-backend failures never appear
/// here: they are recovered by the scalar path.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Vector and metadata collections have different lengths.
    #[error("shape mismatch: {vectors} vectors but {records} metadata records")]
    ShapeMismatch { vectors: usize, records: usize },

    /// Widths disagree: bytes for packed vectors, components for float rows.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A search arrived before any corpus finished loading.
    #[error("index not loaded")]
    NotLoaded,

    /// A corpus artifact does not exist.
    #[error("corpus artifact not found: {}", path.display())]
    CorpusNotFound { path: PathBuf },

    /// A corpus artifact exists but cannot be used.
    #[error("corpus artifact {} is corrupt: {reason}", path.display())]
    CorpusCorrupt { path: PathBuf, reason: String },

    /// A request parameter is unusable (non-finite query, zero shard count, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        EngineError::CorpusCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, EngineError>;
