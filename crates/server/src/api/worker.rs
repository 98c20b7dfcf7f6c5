//! HTTP handlers for a shard worker.

use super::errors::ApiError;
use super::metrics;
use super::models::{ReloadResponse, WorkerHealthResponse, WorkerSearchRequest, WorkerSearchResponse};
use crate::worker::{ShardWorker, WorkerState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bitshard_core::{config, IndexStats};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared state for worker handlers.
#[derive(Clone)]
pub struct WorkerAppState {
    pub worker: Arc<ShardWorker>,
    pub prometheus_handle: PrometheusHandle,
}

/// `POST /search`: top-`k` within this shard.
///
/// `k` above the service limit is clamped; `k = 0` yields no results.
pub async fn search(
    State(state): State<WorkerAppState>,
    Json(req): Json<WorkerSearchRequest>,
) -> Result<Json<WorkerSearchResponse>, ApiError> {
    let k = req.k.min(config::MAX_K);
    let results = state.worker.search(&req.query_vector, k)?;
    metrics::record_search("worker");
    Ok(Json(WorkerSearchResponse {
        shard_id: state.worker.shard_id(),
        results,
    }))
}

/// `GET /health`: 200 only when the shard is `Ready`.
pub async fn health(
    State(state): State<WorkerAppState>,
) -> (StatusCode, Json<WorkerHealthResponse>) {
    let worker = &state.worker;
    let worker_state = worker.state();
    let range = worker.range();
    let (status, code) = match worker_state {
        WorkerState::Ready => ("ready", StatusCode::OK),
        WorkerState::Loading | WorkerState::Unloaded => {
            ("unavailable", StatusCode::SERVICE_UNAVAILABLE)
        }
    };
    (
        code,
        Json(WorkerHealthResponse {
            status: status.to_string(),
            shard_id: worker.shard_id(),
            state: worker_state,
            vectors: worker.vectors(),
            start: range.as_ref().map(|r| r.start),
            end: range.as_ref().map(|r| r.end),
        }),
    )
}

/// `GET /stats`: engine counters for this shard.
pub async fn stats(State(state): State<WorkerAppState>) -> Json<IndexStats> {
    Json(state.worker.stats())
}

/// `POST /admin/reload`: re-read the shard artifacts from disk.
pub async fn reload(
    State(state): State<WorkerAppState>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let vectors = state.worker.load().await?;
    Ok(Json(ReloadResponse {
        shard_id: state.worker.shard_id(),
        state: state.worker.state(),
        vectors,
    }))
}

pub async fn metrics_endpoint(State(state): State<WorkerAppState>) -> String {
    state.prometheus_handle.render()
}
