//! Storage layer: shard artifacts on disk, the in-memory shard, and corpus splitting.
//!
//! Shards are built once and persisted as two parallel files (packed vectors
//! and JSON metadata). Writes are atomic (temp-file + rename) and the vectors
//! file carries a CRC32 footer.

/// Artifact encode/decode with atomic writes.
pub mod persistence;
/// Immutable shard value.
pub mod shard;
/// Contiguous shard assignment and the split manifest.
pub mod split;

pub use persistence::{read_metadata, read_vectors, write_metadata, write_vectors};
pub use shard::{BuildReport, Shard};
pub use split::{
    shard_file_names, shard_for_row, shard_paths, shard_ranges, split_corpus, ManifestEntry,
    ShardManifest,
};
