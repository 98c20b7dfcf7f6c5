//! bitshard-server: HTTP services for sharded binary search.
//!
//! Provides the Shard Worker (one shard behind `POST /search`) and the
//! Coordinator (concurrent fan-out to every worker, partial-failure merge).
//! Core search logic lives in `bitshard-core`.

/// REST API layer: Axum routers, HTTP handlers, models, metrics.
pub mod api;
/// Scatter/gather over shard workers with a shared deadline.
pub mod coordinator;
/// Shard worker lifecycle: load, reload, readiness.
pub mod worker;
