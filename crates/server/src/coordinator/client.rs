//! HTTP client for a single shard worker's `POST /search`.

use super::ShardFailure;
use crate::api::models::WorkerSearchResponse;
use axum::body::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

/// Body sent to every worker. Serialized once per query.
#[derive(Debug, Serialize)]
pub struct WorkerQuery<'a> {
    pub query_vector: &'a [f32],
    pub k: usize,
}

/// Sends a pre-serialized query to `base_url` and decodes the shard's answer.
pub async fn query_worker(
    client: &reqwest::Client,
    base_url: &str,
    body: Bytes,
) -> Result<WorkerSearchResponse, ShardFailure> {
    let url = format!("{}/search", base_url.trim_end_matches('/'));
    let resp = client
        .post(&url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ShardFailure::Timeout
            } else {
                ShardFailure::Unreachable(e.to_string())
            }
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ShardFailure::Status(status.as_u16()));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| ShardFailure::Unreachable(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ShardFailure::Malformed(e.to_string()))
}
