//! # bitshard-core
//!
//! Binary-quantized nearest-neighbor search: float embeddings are packed to one
//! sign bit per dimension, searched by exact Hamming distance, and split into
//! contiguous shards whose per-shard top-k lists merge into a global top-k.
//!
//! This is the core library crate with zero async dependencies, suitable for
//! embedding directly in Rust, Python (via PyO3), or the HTTP shard services.

/// Batch Hamming top-k backends, capability detection, and scalar fallback.
pub mod backend;
/// Global configuration constants: limits, defaults, and tuning parameters.
pub mod config;
/// Metadata records attached to packed vectors.
pub mod document;
/// The local engine: load, swap, search, stats.
pub mod engine;
/// Typed engine errors.
pub mod error;
/// Sign-bit packing and SIMD Hamming kernels.
pub mod quantization;
/// Top-k selection, result types, and cross-shard merge.
pub mod search;
/// Shard artifacts, the immutable shard value, and corpus splitting.
pub mod storage;

pub use backend::{BackendContext, CapabilityTier, HammingBackend};
pub use document::Record;
pub use engine::{BackendInfo, BinaryIndex, IndexStats};
pub use error::{EngineError, Result};
pub use search::{merge_shard_results, MergedResults, SearchResult, ShardHit, ShardOutcome};
pub use storage::{BuildReport, Shard};
