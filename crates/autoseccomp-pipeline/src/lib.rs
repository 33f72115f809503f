//! AutoSeccomp pipeline: trace a workload, write its profile, validate it.
//!
//! Provides a sequential orchestrator that:
//! - Runs the workload under `strace` into a scratch log
//! - Builds and writes the seccomp profile
//! - Re-runs the workload in a container restricted by that profile
//! - Classifies the validation result

pub mod classify;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod stage;

// Re-export key types
pub use classify::{Classifier, ClassifierRule, Marker, Outcome};
pub use error::{PipelineError, Result};
pub use pipeline::{PipelineOrchestrator, PipelineResult, TRACER_UNAVAILABLE_EXIT};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner, RunnerError};
pub use stage::{validation_workload, CommandSpec, PipelineStage, Workload};
