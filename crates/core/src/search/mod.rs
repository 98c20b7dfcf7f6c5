//! Search primitives: top-k selection, result types, and cross-shard merge.

/// Merge of per-shard result lists into a global ranking.
pub mod merge;
/// Bounded top-k selection with deterministic tie-breaks.
pub mod topk;
/// Result and shard-outcome types.
pub mod types;

pub use merge::merge_shard_results;
pub use topk::{select_top_k, TopK};
pub use types::{FailedShard, MergedResults, SearchResult, ShardHit, ShardOutcome};
