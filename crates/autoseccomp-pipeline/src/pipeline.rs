//! Trace → build → write → validate orchestration.
//!
//! Stages run strictly in sequence. A traced command that exits non-zero
//! aborts the run before anything is written. Validation failures are
//! classified and reported, never raised. Only profile persistence (and
//! failing to create the scratch directory) comes back as an `Err`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use autoseccomp_core::{
    build_profile, parse_trace_file, save_profile, traced_network_syscalls, BaselinePolicy,
    ProfileDigest, Settings, SyscallSet,
};
use tracing::{info, warn};

use crate::classify::{Classifier, Outcome};
use crate::error::{PipelineError, Result};
use crate::runner::CommandRunner;
use crate::stage::{container_name, validation_workload, CommandSpec, PipelineStage, Workload};

/// Exit code reported when the tracer itself cannot be started.
pub const TRACER_UNAVAILABLE_EXIT: i32 = 127;

/// Result of a complete pipeline execution.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Last stage reached.
    pub stage: PipelineStage,

    pub outcome: Outcome,

    /// Exit code of the last external command.
    pub exit_code: i32,

    /// Captured stderr + stdout of the last external command.
    pub raw_diagnostics: String,

    /// Written profile, absent when tracing aborted.
    pub profile_path: Option<PathBuf>,

    pub digest: Option<ProfileDigest>,

    /// Distinct syscalls seen in the trace.
    pub traced: SyscallSet,

    /// Number of names in the profile's allow rule.
    pub allowed_count: usize,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl PipelineResult {
    /// Whether the run stopped at the tracing stage.
    pub fn aborted(&self) -> bool {
        self.outcome == Outcome::TraceAborted
    }

    /// Exit code for the calling process.
    ///
    /// A trace abort propagates the traced command's exit code. Otherwise 0,
    /// unless `strict` is set and validation did not succeed, which gives 1.
    pub fn process_exit_code(&self, strict: bool) -> i32 {
        match self.outcome {
            Outcome::TraceAborted => {
                if (1..=255).contains(&self.exit_code) {
                    self.exit_code
                } else {
                    1
                }
            }
            Outcome::Success => 0,
            Outcome::SeccompDenied | Outcome::OtherFailure => i32::from(strict),
        }
    }

    fn aborted_at_trace(exit_code: i32, raw_diagnostics: String, start: Instant) -> Self {
        Self {
            stage: PipelineStage::Tracing,
            outcome: Outcome::TraceAborted,
            exit_code,
            raw_diagnostics,
            profile_path: None,
            digest: None,
            traced: SyscallSet::new(),
            allowed_count: 0,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Pipeline orchestrator.
///
/// Holds the resolved baseline so repeated runs in one process share it.
pub struct PipelineOrchestrator {
    runner: Arc<dyn CommandRunner>,
    baseline: Arc<BaselinePolicy>,
    settings: Settings,
    classifier: Classifier,
}

impl PipelineOrchestrator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        baseline: Arc<BaselinePolicy>,
        settings: Settings,
    ) -> Self {
        Self {
            runner,
            baseline,
            settings,
            classifier: Classifier::standard(),
        }
    }

    /// Replace the validation classifier.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn baseline(&self) -> &BaselinePolicy {
        &self.baseline
    }

    /// Trace `workload`, write its profile to `out`, and validate it.
    pub async fn run(&self, workload: &Workload, out: &Path) -> Result<PipelineResult> {
        let start = Instant::now();

        // Tracing. The scratch directory is removed when `workspace` drops,
        // on every return path below.
        let workspace = tempfile::Builder::new()
            .prefix("autoseccomp-")
            .tempdir()
            .map_err(PipelineError::Workspace)?;
        let log_path = workspace.path().join("trace.log");

        let trace_spec = CommandSpec::trace(&self.settings.trace, &log_path, workload.argv());
        info!(stage = %PipelineStage::Tracing, command = %workload.line(), "starting pipeline");

        match self.runner.run(&trace_spec).await {
            Ok(output) if output.success() => {}
            Ok(output) => {
                warn!(
                    stage = %PipelineStage::Tracing,
                    exit_code = output.exit_code,
                    "traced command failed, aborting"
                );
                let diagnostics = output.combined();
                return Ok(PipelineResult::aborted_at_trace(
                    output.exit_code,
                    diagnostics,
                    start,
                ));
            }
            Err(e) => {
                warn!(stage = %PipelineStage::Tracing, error = %e, "tracer could not run, aborting");
                return Ok(PipelineResult::aborted_at_trace(
                    TRACER_UNAVAILABLE_EXIT,
                    e.to_string(),
                    start,
                ));
            }
        }

        // Building
        info!(stage = %PipelineStage::Building, log = %log_path.display(), "parsing trace");
        let traced = parse_trace_file(&log_path)?;
        let network = traced_network_syscalls(&traced, &self.baseline);
        if !network.is_empty() {
            warn!(
                syscalls = ?network,
                "trace uses network syscalls; they stay allowed in the profile"
            );
        }
        let profile = build_profile(&traced, &self.baseline);
        if let Err(e) = workspace.close() {
            warn!(error = %e, "failed to remove trace workspace");
        }

        // Writing
        info!(stage = %PipelineStage::Writing, path = %out.display(), "writing profile");
        let digest = save_profile(&profile, out)?;

        // Validating
        let profile_abs = std::fs::canonicalize(out).unwrap_or_else(|_| out.to_path_buf());
        let shell_line = validation_workload(&self.settings.validate, workload);
        let validate_spec = CommandSpec::validate(
            &self.settings.validate,
            &profile_abs,
            &shell_line,
            &container_name(),
        );
        info!(stage = %PipelineStage::Validating, workload = %shell_line, "validating profile");

        let (exit_code, raw_diagnostics) = match self.runner.run(&validate_spec).await {
            Ok(output) => (output.exit_code, output.combined()),
            Err(e) => (-1, e.to_string()),
        };
        let outcome = self.classifier.classify(exit_code, &raw_diagnostics);

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            stage = %PipelineStage::Done,
            outcome = %outcome,
            exit_code,
            duration_ms,
            "pipeline finished"
        );

        Ok(PipelineResult {
            stage: PipelineStage::Done,
            outcome,
            exit_code,
            raw_diagnostics,
            profile_path: Some(out.to_path_buf()),
            digest: Some(digest),
            allowed_count: profile.allowed_names().len(),
            traced,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(outcome: Outcome, exit_code: i32) -> PipelineResult {
        PipelineResult {
            stage: PipelineStage::Done,
            outcome,
            exit_code,
            raw_diagnostics: String::new(),
            profile_path: None,
            digest: None,
            traced: SyscallSet::new(),
            allowed_count: 0,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_trace_abort_propagates_exit_code() {
        let r = result(Outcome::TraceAborted, 2);
        assert!(r.aborted());
        assert_eq!(r.process_exit_code(false), 2);
        assert_eq!(r.process_exit_code(true), 2);
    }

    #[test]
    fn test_out_of_range_abort_code_maps_to_one() {
        assert_eq!(result(Outcome::TraceAborted, -1).process_exit_code(false), 1);
        assert_eq!(result(Outcome::TraceAborted, 300).process_exit_code(false), 1);
    }

    #[test]
    fn test_validation_failure_exit_code_depends_on_strict() {
        for outcome in [Outcome::SeccompDenied, Outcome::OtherFailure] {
            let r = result(outcome, 126);
            assert!(!r.aborted());
            assert_eq!(r.process_exit_code(false), 0);
            assert_eq!(r.process_exit_code(true), 1);
        }
    }

    #[test]
    fn test_success_exit_code() {
        assert_eq!(result(Outcome::Success, 0).process_exit_code(true), 0);
    }
}
