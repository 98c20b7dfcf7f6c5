//! Result types shared by the local engine, workers, and the coordinator.

use crate::document::Record;
use serde::{Deserialize, Serialize};

/// One ranked match from a single shard.
///
/// `distance` is the exact Hamming distance and `score = 1 - distance / D`
/// where `D` is the shard's bit width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Row position within the shard.
    pub index: usize,
    pub record_id: String,
    pub score: f32,
    pub distance: u32,
    pub metadata: Record,
    pub text_preview: String,
}

/// A [`SearchResult`] tagged with the shard that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardHit {
    pub shard_id: u32,
    #[serde(flatten)]
    pub result: SearchResult,
}

/// What one shard contributed to a fan-out.
///
/// A shard that failed is kept as `Missing` so it is still counted.
#[derive(Debug, Clone, PartialEq)]
pub enum ShardOutcome {
    Answered {
        shard_id: u32,
        results: Vec<SearchResult>,
    },
    Missing {
        shard_id: u32,
        reason: String,
    },
}

impl ShardOutcome {
    pub fn shard_id(&self) -> u32 {
        match self {
            ShardOutcome::Answered { shard_id, .. } | ShardOutcome::Missing { shard_id, .. } => {
                *shard_id
            }
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, ShardOutcome::Answered { .. })
    }
}

/// A shard that contributed nothing, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedShard {
    pub shard_id: u32,
    pub reason: String,
}

/// Global top-k assembled from per-shard outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedResults {
    /// Sum of hits returned by the shards that answered.
    pub total_hits: usize,
    pub top_k: Vec<ShardHit>,
    pub shards_total: usize,
    pub shards_responded: usize,
    pub failed_shards: Vec<FailedShard>,
}
