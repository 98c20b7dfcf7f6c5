//! HTTP handlers for the coordinator.

use super::errors::ApiError;
use super::metrics;
use super::models::{CoordinatorHealthResponse, CoordinatorSearchRequest};
use crate::coordinator::Coordinator;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bitshard_core::config;
use bitshard_core::search::MergedResults;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;

/// Shared state for coordinator handlers.
#[derive(Clone)]
pub struct CoordinatorAppState {
    pub coordinator: Arc<Coordinator>,
    pub prometheus_handle: PrometheusHandle,
}

/// `POST /search`: fan out to every shard and merge the global top-`k`.
///
/// Responds 200 with partial results while at least one shard answers.
pub async fn search(
    State(state): State<CoordinatorAppState>,
    Json(req): Json<CoordinatorSearchRequest>,
) -> Result<Json<MergedResults>, ApiError> {
    let k = req.k.min(config::MAX_K);
    let embedding = state
        .coordinator
        .resolve_query(req.text, req.embedding)
        .await?;
    let timeout = req.timeout_ms.map(Duration::from_millis);
    let merged = state.coordinator.search(&embedding, k, timeout).await?;
    metrics::record_search("coordinator");
    Ok(Json(merged))
}

pub async fn health(
    State(state): State<CoordinatorAppState>,
) -> (StatusCode, Json<CoordinatorHealthResponse>) {
    (
        StatusCode::OK,
        Json(CoordinatorHealthResponse {
            status: "coordinator_ready".to_string(),
            workers: state.coordinator.worker_count(),
        }),
    )
}

pub async fn metrics_endpoint(State(state): State<CoordinatorAppState>) -> String {
    state.prometheus_handle.render()
}
