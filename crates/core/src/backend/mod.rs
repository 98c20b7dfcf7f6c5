//! Batch Hamming top-k backends and the fallback context the engine searches through.
//!
//! A [`HammingBackend`] computes exact distances from one packed query to every
//! row of a [`PackedMatrix`] and returns the k nearest. Two implementations
//! exist: [`ScalarBackend`] (portable reference) and [`NativeBackend`]
//! (capability-tiered SIMD). [`BackendContext`] is built once at startup,
//! handed to the engine, and guarantees that a native failure never reaches
//! the caller: the call is retried on the scalar backend.

/// CPU capability tiers and process-wide detection.
pub mod capability;
/// SIMD backend built on [`crate::quantization::HammingKernel`].
pub mod native;
/// Portable reference backend.
pub mod scalar;

pub use capability::{detect_capability, CapabilityTier};
pub use native::NativeBackend;
pub use scalar::ScalarBackend;

use crate::quantization::PackedMatrix;
use crate::search::TopK;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// Failure inside a backend call. Never escapes [`BackendContext`].
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("query is {query} bytes but corpus rows are {row_width} bytes")]
    DimensionMismatch { query: usize, row_width: usize },

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Exact batch Hamming distance + top-k.
///
/// Implementations must return the same `(indices, distances)` as
/// [`ScalarBackend`] for every input: ascending distance, ties by row index.
pub trait HammingBackend: Send + Sync {
    /// Short identifier reported in stats.
    fn name(&self) -> &'static str;

    /// Tier this backend runs at.
    fn tier(&self) -> CapabilityTier;

    /// k nearest rows of `corpus` to `query`. `k` larger than the corpus returns every row.
    fn batch_search(
        &self,
        query: &[u8],
        corpus: &PackedMatrix,
        k: usize,
    ) -> Result<TopK, BackendError>;
}

pub(crate) fn check_width(query: &[u8], corpus: &PackedMatrix) -> Result<(), BackendError> {
    if query.len() != corpus.row_width() {
        return Err(BackendError::DimensionMismatch {
            query: query.len(),
            row_width: corpus.row_width(),
        });
    }
    Ok(())
}

/// Backend selection for one engine: an optional accelerated backend in front
/// of the scalar reference.
///
/// Immutable after construction and cheap to clone.
#[derive(Clone)]
pub struct BackendContext {
    native: Option<Arc<dyn HammingBackend>>,
    scalar: Arc<ScalarBackend>,
    capability: CapabilityTier,
}

impl BackendContext {
    /// Probes the host and enables the native backend when the host supports
    /// anything beyond scalar code.
    pub fn detect() -> Self {
        let capability = detect_capability();
        let native = NativeBackend::detect().map(|b| Arc::new(b) as Arc<dyn HammingBackend>);
        let ctx = Self {
            native,
            scalar: Arc::new(ScalarBackend),
            capability,
        };
        tracing::info!(
            capability = %capability,
            backend = ctx.backend_name(),
            "Hamming backend selected"
        );
        ctx
    }

    /// Scalar reference path only, regardless of the host.
    pub fn scalar_only() -> Self {
        Self {
            native: None,
            scalar: Arc::new(ScalarBackend),
            capability: detect_capability(),
        }
    }

    /// Uses `native` in front of the scalar fallback.
    pub fn with_native(native: Arc<dyn HammingBackend>) -> Self {
        Self {
            native: Some(native),
            scalar: Arc::new(ScalarBackend),
            capability: detect_capability(),
        }
    }

    /// `detect()` when `use_native`, otherwise `scalar_only()`.
    pub fn from_preference(use_native: bool) -> Self {
        if use_native {
            Self::detect()
        } else {
            Self::scalar_only()
        }
    }

    /// Process-wide capability tier (independent of which backend is active).
    pub fn capability(&self) -> CapabilityTier {
        self.capability
    }

    pub fn native_available(&self) -> bool {
        self.native.is_some()
    }

    /// Name of the backend searches are dispatched to first.
    pub fn backend_name(&self) -> &'static str {
        match &self.native {
            Some(native) => native.name(),
            None => self.scalar.name(),
        }
    }

    /// Tier of the backend searches are dispatched to first.
    pub fn active_tier(&self) -> CapabilityTier {
        match &self.native {
            Some(native) => native.tier(),
            None => CapabilityTier::Scalar,
        }
    }

    /// Runs the native backend if present, falling back to scalar on error or panic.
    ///
    /// A width mismatch is a caller error and is returned as-is; the engine
    /// validates widths before calling, so it only surfaces here for direct users.
    pub fn batch_search(
        &self,
        query: &[u8],
        corpus: &PackedMatrix,
        k: usize,
    ) -> Result<TopK, BackendError> {
        check_width(query, corpus)?;
        let k = k.min(corpus.rows());
        if let Some(native) = &self.native {
            let outcome = catch_unwind(AssertUnwindSafe(|| native.batch_search(query, corpus, k)));
            match outcome {
                Ok(Ok(top)) => return Ok(top),
                Ok(Err(e)) => {
                    tracing::warn!(
                        backend = native.name(),
                        error = %e,
                        "Native backend failed, falling back to scalar"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        backend = native.name(),
                        "Native backend panicked, falling back to scalar"
                    );
                }
            }
        }
        self.scalar.batch_search(query, corpus, k)
    }
}

impl std::fmt::Debug for BackendContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendContext")
            .field("backend", &self.backend_name())
            .field("capability", &self.capability)
            .finish()
    }
}
