//! Client for the external text-embedding service.
//!
//! Protocol: `POST <url>` with `{"text": "..."}`, answered by `{"embedding": [f32, ...]}`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding service unreachable: {0}")]
    Unreachable(String),

    #[error("embedding service returned HTTP {0}")]
    Status(u16),

    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Calls one embedding endpoint.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl EmbeddingClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Embeds `text`. An empty embedding counts as malformed.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let resp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&EmbedRequest { text })
            .send()
            .await
            .map_err(|e| EmbeddingError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EmbeddingError::Status(status.as_u16()));
        }

        let body: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
        if body.embedding.is_empty() {
            return Err(EmbeddingError::Malformed("empty embedding".into()));
        }
        Ok(body.embedding)
    }
}
