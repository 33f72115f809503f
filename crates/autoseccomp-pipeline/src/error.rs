//! Error types for the pipeline.

use autoseccomp_core::ProfileError;

/// Hard failures of a pipeline run.
///
/// Traced-command and validation failures are not errors; they come back as
/// a classified [`PipelineResult`](crate::PipelineResult).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no command given to trace")]
    EmptyCommand,

    #[error("cannot split command line {line:?}: unbalanced quotes or escapes")]
    CommandSyntax { line: String },

    #[error("cannot quote argument containing a NUL byte")]
    CommandQuote,

    #[error("failed to create trace workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
