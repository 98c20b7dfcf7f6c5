//! REST API layer built on Axum.
//!
//! Two routers share one middleware stack: the shard worker's (`/search`,
//! `/health`, `/stats`, `/admin/reload`) and the coordinator's (`/search`,
//! `/health`). Both expose `/metrics` and tag every request with an id.

/// Coordinator HTTP handlers and application state.
pub mod coordinator;
/// API error types mapped to HTTP status codes.
pub mod errors;
/// Prometheus metrics recording.
pub mod metrics;
/// Request and response data transfer objects.
pub mod models;
/// Shard worker HTTP handlers and application state.
pub mod worker;

use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Router};
use bitshard_core::config;
use coordinator::CoordinatorAppState;
use std::time::{Duration, Instant};
use tower::buffer::BufferLayer;
use tower::limit::ConcurrencyLimitLayer;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use worker::WorkerAppState;

async fn request_id_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("request", request_id = %request_id);
    async move {
        let mut response = next.run(req).await;
        response.headers_mut().insert(
            axum::http::HeaderName::from_static("x-request-id"),
            axum::http::HeaderValue::from_str(&request_id)
                .expect("UUID v4 is always valid ASCII for header values"),
        );
        response
    }
    .instrument(span)
    .await
}

async fn metrics_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    metrics::record_request(&method, &path, response.status().as_u16(), start.elapsed());
    response
}

/// Middleware stack (outermost to innermost):
/// Concurrency limit → Timeout → Body limit → Trace → Request ID → Metrics.
fn with_service_layers(router: Router) -> Router {
    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config::MAX_REQUEST_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|err: tower::BoxError| async move {
                    if err.is::<tower::timeout::error::Elapsed>() {
                        StatusCode::REQUEST_TIMEOUT
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                }))
                .layer(BufferLayer::new(1024))
                .layer(ConcurrencyLimitLayer::new(config::MAX_CONCURRENT_REQUESTS))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config::REQUEST_TIMEOUT_SECS,
                ))),
        )
}

/// Builds the shard worker router.
pub fn create_worker_router(state: WorkerAppState) -> Router {
    let router = Router::new()
        .route("/search", post(worker::search))
        .route("/health", get(worker::health))
        .route("/stats", get(worker::stats))
        .route("/admin/reload", post(worker::reload))
        .route("/metrics", get(worker::metrics_endpoint))
        .with_state(state);
    with_service_layers(router)
}

/// Builds the coordinator router.
pub fn create_coordinator_router(state: CoordinatorAppState) -> Router {
    let router = Router::new()
        .route("/search", post(coordinator::search))
        .route("/health", get(coordinator::health))
        .route("/metrics", get(coordinator::metrics_endpoint))
        .with_state(state);
    with_service_layers(router)
}
