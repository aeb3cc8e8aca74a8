//! Error types for the diagnostic pipeline.
//!
//! User-facing failures (no code, bad code, unknown code) are not errors; they
//! are pipeline outcomes. The types here cover what goes wrong around them.

use obd_catalog::CatalogError;

/// Errors produced while running a request.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("request cancelled")]
    Cancelled,

    #[error("internal pipeline error: {0}")]
    Internal(String),
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors from an interaction log sink.
#[derive(Debug, thiserror::Error)]
pub enum LogSinkError {
    #[error("log sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode interaction record: {0}")]
    Encode(#[from] serde_json::Error),
}
