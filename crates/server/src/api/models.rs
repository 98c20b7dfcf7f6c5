//! Request and response data transfer objects for the REST API.
//!
//! All types derive `Serialize` and/or `Deserialize` for JSON marshalling via Axum.

use crate::worker::WorkerState;
use bitshard_core::config;
use bitshard_core::search::SearchResult;
use serde::{Deserialize, Serialize};

fn default_k() -> usize {
    config::DEFAULT_K
}

/// Request body for a worker's `POST /search`.
#[derive(Debug, Deserialize)]
pub struct WorkerSearchRequest {
    pub query_vector: Vec<f32>,
    #[serde(default = "default_k")]
    pub k: usize,
}

/// Response body for a worker's `POST /search`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerSearchResponse {
    pub shard_id: u32,
    pub results: Vec<SearchResult>,
}

/// Response body for a worker's `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerHealthResponse {
    /// `ready` or `unavailable`.
    pub status: String,
    pub shard_id: u32,
    pub state: WorkerState,
    pub vectors: usize,
    /// Global row range, present when a split manifest was found.
    pub start: Option<usize>,
    pub end: Option<usize>,
}

/// Response body for `POST /admin/reload`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub shard_id: u32,
    pub state: WorkerState,
    pub vectors: usize,
}

/// Request body for the coordinator's `POST /search`.
///
/// Exactly one of `text` or `embedding` is required.
#[derive(Debug, Deserialize)]
pub struct CoordinatorSearchRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Shortens the configured fan-out deadline for this query.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Response body for the coordinator's `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CoordinatorHealthResponse {
    pub status: String,
    pub workers: usize,
}
