//! Error taxonomy for profile synthesis.

use std::path::PathBuf;

/// Errors produced while reading traces, loading settings, or persisting profiles.
///
/// Trace *content* never produces an error (parsing is lenient) and baseline
/// source failures are absorbed by the resolver, so neither has a variant here.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("failed to read trace log {path}: {source}")]
    TraceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write profile {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for profile operations.
pub type Result<T> = std::result::Result<T, ProfileError>;
