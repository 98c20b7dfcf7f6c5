//! Prometheus metrics recording.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Records HTTP request metrics.
pub fn record_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Records one served search. `role` is `worker` or `coordinator`.
pub fn record_search(role: &'static str) {
    counter!("bitshard_searches_total", "role" => role).increment(1);
}

/// Records a shard that was excluded from a fan-out merge.
pub fn record_shard_failure(shard_id: u32, reason: &'static str) {
    counter!(
        "bitshard_shard_failures_total",
        "shard" => shard_id.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_fanout(duration: Duration) {
    histogram!("bitshard_fanout_duration_seconds").record(duration.as_secs_f64());
}

/// Updates the `bitshard_shard_vectors` gauge after a load.
pub fn set_shard_vectors(shard_id: u32, vectors: usize) {
    gauge!("bitshard_shard_vectors", "shard" => shard_id.to_string()).set(vectors as f64);
}
