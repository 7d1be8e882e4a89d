use std::sync::Arc;
use thiserror::Error;

/// Main error type for importcost
#[derive(Error, Debug)]
pub enum ImportCostError {
    #[error("cache data malformed: {len} bytes is not a whole number of records")]
    MalformedCache { len: usize },

    #[error("failed to resolve module '{name}': {reason}")]
    Resolution { name: String, reason: String },

    #[error("failed to measure '{name}': {reason}")]
    Measurement { name: String, reason: String },

    #[error("bundler unavailable: {0}")]
    ToolMissing(String),

    #[error("failed to parse source: {0}")]
    Parse(String),

    /// A failure observed through a shared in-flight computation. Every
    /// waiter of the same cache slot receives the same underlying error.
    #[error("{0}")]
    Shared(Arc<ImportCostError>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
