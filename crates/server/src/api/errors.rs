//! API error types mapped to HTTP status codes.
//!
//! Each [`ApiError`] variant maps to a specific HTTP status code and produces
//! a JSON response body `{"error": "message"}`.

use crate::coordinator::CoordinatorError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bitshard_core::EngineError;
use serde_json::json;

/// Application-level error type that implements `IntoResponse`.
///
/// Each variant maps to an HTTP status code:
/// - `BadRequest` → 400
/// - `BadGateway` → 502
/// - `ServiceUnavailable` → 503
/// - `Internal` → 500
#[derive(Debug)]
pub enum ApiError {
    /// Invalid request parameters (400).
    BadRequest(String),
    /// An upstream dependency answered badly (502).
    BadGateway(String),
    /// Shard not loaded, or no shard reachable (503).
    ServiceUnavailable(String),
    /// Unexpected server error (500).
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg)
            | ApiError::BadGateway(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::Internal(msg) => msg,
        };
        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotLoaded => ApiError::ServiceUnavailable("Shard not loaded".into()),
            EngineError::CorpusNotFound { .. } => ApiError::ServiceUnavailable(e.to_string()),
            EngineError::DimensionMismatch { .. }
            | EngineError::ShapeMismatch { .. }
            | EngineError::InvalidArgument(_) => ApiError::BadRequest(e.to_string()),
            EngineError::CorpusCorrupt { .. } | EngineError::Io(_) => {
                tracing::error!(error = %e, "Engine failure");
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(e: CoordinatorError) -> Self {
        match e {
            CoordinatorError::AllShardsUnavailable { .. } => {
                ApiError::ServiceUnavailable(e.to_string())
            }
            CoordinatorError::InvalidQuery(_) | CoordinatorError::EmbedderNotConfigured => {
                ApiError::BadRequest(e.to_string())
            }
            CoordinatorError::Embedding(_) => ApiError::BadGateway(e.to_string()),
        }
    }
}
