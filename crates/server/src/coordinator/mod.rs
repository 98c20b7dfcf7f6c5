//! Coordinator: scatter a query to every shard worker, gather under one deadline.
//!
//! Each worker call is an independent future wrapped in `timeout_at` against a
//! single shared deadline, and every future resolves to a [`ShardOutcome`]
//! rather than an error. A slow or failed shard therefore turns into a
//! `Missing` entry instead of delaying or aborting the whole query. Only when
//! no shard answers does the query fail.

/// HTTP client for one worker.
pub mod client;
/// External embedding service client.
pub mod embedder;

use crate::api::metrics;
use axum::body::Bytes;
use bitshard_core::search::{merge_shard_results, MergedResults, ShardOutcome};
use client::{query_worker, WorkerQuery};
use embedder::{EmbeddingClient, EmbeddingError};
use futures::future::join_all;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why one worker contributed nothing to a fan-out.
#[derive(Debug, Error)]
pub enum ShardFailure {
    #[error("worker unreachable: {0}")]
    Unreachable(String),

    #[error("worker did not answer before the deadline")]
    Timeout,

    #[error("worker returned HTTP {0}")]
    Status(u16),

    #[error("malformed worker response: {0}")]
    Malformed(String),
}

impl ShardFailure {
    /// Low-cardinality label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ShardFailure::Unreachable(_) => "unreachable",
            ShardFailure::Timeout => "timeout",
            ShardFailure::Status(_) => "status",
            ShardFailure::Malformed(_) => "malformed",
        }
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("all {attempted} shards unavailable")]
    AllShardsUnavailable { attempted: usize },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("text queries need an embedding service, none is configured")]
    EmbedderNotConfigured,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Startup configuration for a [`Coordinator`].
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Worker base URLs; position `i` is shard `i`.
    pub worker_urls: Vec<String>,
    /// Deadline covering the whole fan-out.
    pub fanout_timeout: Duration,
    /// Full URL of the embedding endpoint, if text queries are supported.
    pub embedder_url: Option<String>,
}

pub struct Coordinator {
    workers: Vec<String>,
    client: reqwest::Client,
    fanout_timeout: Duration,
    embedder: Option<EmbeddingClient>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        let client = reqwest::Client::new();
        let embedder = config.embedder_url.map(|url| {
            EmbeddingClient::new(
                client.clone(),
                url,
                Duration::from_secs(bitshard_core::config::REQUEST_TIMEOUT_SECS),
            )
        });
        Self {
            workers: config.worker_urls,
            client,
            fanout_timeout: config.fanout_timeout,
            embedder,
        }
    }

    pub fn workers(&self) -> &[String] {
        &self.workers
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn fanout_timeout(&self) -> Duration {
        self.fanout_timeout
    }

    /// Turns a `{text | embedding}` request into a query embedding.
    ///
    /// Exactly one of the two must be present. Text is embedded once here and
    /// the result is shared by every shard request.
    pub async fn resolve_query(
        &self,
        text: Option<String>,
        embedding: Option<Vec<f32>>,
    ) -> Result<Vec<f32>, CoordinatorError> {
        let embedding = match (text, embedding) {
            (Some(_), Some(_)) => {
                return Err(CoordinatorError::InvalidQuery(
                    "provide either text or embedding, not both".into(),
                ))
            }
            (None, None) => {
                return Err(CoordinatorError::InvalidQuery(
                    "one of text or embedding is required".into(),
                ))
            }
            (None, Some(embedding)) => embedding,
            (Some(text), None) => {
                let embedder = self
                    .embedder
                    .as_ref()
                    .ok_or(CoordinatorError::EmbedderNotConfigured)?;
                embedder.embed(&text).await?
            }
        };
        if embedding.is_empty() {
            return Err(CoordinatorError::InvalidQuery("embedding is empty".into()));
        }
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(CoordinatorError::InvalidQuery(
                "embedding contains NaN or Inf".into(),
            ));
        }
        Ok(embedding)
    }

    /// Queries every worker concurrently; all calls share one deadline.
    ///
    /// Returns one outcome per worker in shard order. Calls still pending at
    /// the deadline are dropped and reported as timeouts.
    pub async fn fan_out(
        &self,
        embedding: &[f32],
        k: usize,
        timeout: Duration,
    ) -> Result<Vec<ShardOutcome>, CoordinatorError> {
        let body = serde_json::to_vec(&WorkerQuery {
            query_vector: embedding,
            k,
        })
        .map(Bytes::from)
        .map_err(|e| CoordinatorError::InvalidQuery(e.to_string()))?;

        let deadline = tokio::time::Instant::now() + timeout;
        let calls = self.workers.iter().enumerate().map(|(i, url)| {
            let shard_id = i as u32;
            let call = query_worker(&self.client, url, body.clone());
            async move {
                let result = match tokio::time::timeout_at(deadline, call).await {
                    Ok(result) => result,
                    Err(_) => Err(ShardFailure::Timeout),
                };
                match result {
                    Ok(response) => {
                        if response.shard_id != shard_id {
                            tracing::warn!(
                                worker = %url,
                                configured = shard_id,
                                reported = response.shard_id,
                                "Worker reports a different shard id, using configured position"
                            );
                        }
                        ShardOutcome::Answered {
                            shard_id,
                            results: response.results,
                        }
                    }
                    Err(failure) => {
                        tracing::warn!(
                            shard_id,
                            worker = %url,
                            reason = %failure,
                            "Shard excluded from merge"
                        );
                        metrics::record_shard_failure(shard_id, failure.kind());
                        ShardOutcome::Missing {
                            shard_id,
                            reason: failure.to_string(),
                        }
                    }
                }
            }
        });

        Ok(join_all(calls).await)
    }

    /// Fan-out plus merge into the global top-`k`.
    ///
    /// `timeout` can shorten the configured deadline but never extend it.
    /// Fails only when no shard answered.
    pub async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        timeout: Option<Duration>,
    ) -> Result<MergedResults, CoordinatorError> {
        let timeout = timeout.map_or(self.fanout_timeout, |t| t.min(self.fanout_timeout));
        let started = Instant::now();
        let outcomes = self.fan_out(embedding, k, timeout).await?;
        metrics::record_fanout(started.elapsed());

        let attempted = outcomes.len();
        if !outcomes.iter().any(ShardOutcome::is_answered) {
            tracing::error!(attempted, "No shard answered");
            return Err(CoordinatorError::AllShardsUnavailable { attempted });
        }

        let merged = merge_shard_results(outcomes, k);
        tracing::debug!(
            shards_responded = merged.shards_responded,
            shards_total = merged.shards_total,
            total_hits = merged.total_hits,
            "Fan-out merged"
        );
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(workers: Vec<String>, embedder_url: Option<String>) -> Coordinator {
        Coordinator::new(CoordinatorConfig {
            worker_urls: workers,
            fanout_timeout: Duration::from_millis(500),
            embedder_url,
        })
    }

    #[tokio::test]
    async fn test_resolve_query_requires_exactly_one_input() {
        let c = coordinator(Vec::new(), None);
        assert!(matches!(
            c.resolve_query(None, None).await,
            Err(CoordinatorError::InvalidQuery(_))
        ));
        assert!(matches!(
            c.resolve_query(Some("q".into()), Some(vec![1.0])).await,
            Err(CoordinatorError::InvalidQuery(_))
        ));
        assert!(matches!(
            c.resolve_query(Some("q".into()), None).await,
            Err(CoordinatorError::EmbedderNotConfigured)
        ));
        assert!(matches!(
            c.resolve_query(None, Some(vec![1.0, f32::NAN])).await,
            Err(CoordinatorError::InvalidQuery(_))
        ));
        assert_eq!(
            c.resolve_query(None, Some(vec![0.5, -0.5])).await.unwrap(),
            vec![0.5, -0.5]
        );
    }

    #[tokio::test]
    async fn test_no_workers_is_all_unavailable() {
        let c = coordinator(Vec::new(), None);
        let err = c.search(&[1.0; 8], 3, None).await.unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::AllShardsUnavailable { attempted: 0 }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_worker_is_missing() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let c = coordinator(vec![url], None);
        let outcomes = c
            .fan_out(&[1.0; 8], 3, Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_answered());
        assert_eq!(outcomes[0].shard_id(), 0);
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(ShardFailure::Timeout.kind(), "timeout");
        assert_eq!(ShardFailure::Status(503).kind(), "status");
        assert_eq!(ShardFailure::Unreachable("refused".into()).kind(), "unreachable");
        assert_eq!(ShardFailure::Malformed("missing field".into()).kind(), "malformed");
    }
}
