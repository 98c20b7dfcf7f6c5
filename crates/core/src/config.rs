//! Global configuration constants for bitshard.
//!
//! Quantization parameters, search limits, and service defaults are defined here.
//! These are compile-time constants; runtime configuration is handled via CLI
//! arguments and environment variables in the server binary.

/// Embedding dimension assumed before a corpus is loaded (MiniLM-sized embeddings).
pub const DEFAULT_DIMENSION: usize = 384;

/// Added to the L2 norm before normalizing, so an all-zero embedding never divides by zero.
pub const NORM_EPSILON: f32 = 1e-12;

/// Maximum number of characters kept in a result's text preview.
pub const PREVIEW_CHARS: usize = 200;

/// Appended to a text preview that was truncated.
pub const PREVIEW_ELLIPSIS: &str = "...";

/// Preview used when a record has no text field.
pub const NO_PREVIEW: &str = "No preview available.";

/// Metadata fields searched, in order, for a record's preview text.
pub const TEXT_FIELDS: [&str; 3] = ["abstract", "text", "summary"];

/// Metadata field holding a record's identifier.
pub const ID_FIELD: &str = "id";

/// Default number of results (`k`) per search request.
pub const DEFAULT_K: usize = 10;

/// Maximum number of results (`k`) per search request. Larger values are clamped.
pub const MAX_K: usize = 10_000;

/// Default number of shards produced by `split`.
pub const DEFAULT_SHARD_COUNT: usize = 3;

/// Default HTTP port for a shard worker.
pub const DEFAULT_WORKER_PORT: u16 = 8001;

/// Default HTTP port for the coordinator.
pub const DEFAULT_COORDINATOR_PORT: u16 = 8000;

/// Default directory holding shard artifacts.
pub const DEFAULT_DATA_DIR: &str = "data/sharded";

/// Default deadline (milliseconds) covering an entire coordinator fan-out.
pub const DEFAULT_FANOUT_TIMEOUT_MS: u64 = 2_000;

/// Per-request timeout in seconds for the HTTP services.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum HTTP request body size in bytes (4 MB).
pub const MAX_REQUEST_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Maximum number of concurrent in-flight requests per service.
pub const MAX_CONCURRENT_REQUESTS: usize = 512;

/// File name of the shard manifest written by `split`.
pub const MANIFEST_FILE: &str = "manifest.json";
