//! Merging per-shard top-k lists into a global top-k.

use super::types::{FailedShard, MergedResults, ShardHit, ShardOutcome};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

/// Merges shard outcomes into the global top-`k`.
///
/// Hits are ordered by score descending, then shard id ascending, then their
/// position in the shard's own list. Missing shards add nothing to the ranking
/// but are reported in `failed_shards`.
pub fn merge_shard_results(outcomes: Vec<ShardOutcome>, k: usize) -> MergedResults {
    let shards_total = outcomes.len();
    let mut shards_responded = 0;
    let mut total_hits = 0;
    let mut failed_shards = Vec::new();
    let mut ranked: Vec<(Reverse<OrderedFloat<f32>>, u32, usize, ShardHit)> = Vec::new();

    for outcome in outcomes {
        match outcome {
            ShardOutcome::Answered { shard_id, results } => {
                shards_responded += 1;
                total_hits += results.len();
                ranked.extend(results.into_iter().enumerate().map(|(pos, result)| {
                    (
                        Reverse(OrderedFloat(result.score)),
                        shard_id,
                        pos,
                        ShardHit { shard_id, result },
                    )
                }));
            }
            ShardOutcome::Missing { shard_id, reason } => {
                failed_shards.push(FailedShard { shard_id, reason });
            }
        }
    }

    ranked.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
    ranked.truncate(k);
    failed_shards.sort_by_key(|f| f.shard_id);

    MergedResults {
        total_hits,
        top_k: ranked.into_iter().map(|(_, _, _, hit)| hit).collect(),
        shards_total,
        shards_responded,
        failed_shards,
    }
}
