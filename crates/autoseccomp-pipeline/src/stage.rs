//! Pipeline stages and the external commands they invoke.

use std::fmt;
use std::path::Path;

use autoseccomp_core::config::{TraceSettings, ValidateSettings};
use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Run the workload under the tracer.
    Tracing,

    /// Parse the trace and merge with the baseline.
    Building,

    /// Persist the profile.
    Writing,

    /// Re-run the workload in a container restricted by the profile.
    Validating,

    Done,
}

impl PipelineStage {
    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Tracing => "tracing",
            PipelineStage::Building => "building",
            PipelineStage::Writing => "writing",
            PipelineStage::Validating => "validating",
            PipelineStage::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Human-readable name for logs.
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Timeout in seconds; 0 waits indefinitely.
    pub timeout_secs: u64,
}

impl CommandSpec {
    /// `<tracer> <flags..> -o <log> <argv..>`
    pub fn trace(settings: &TraceSettings, log_path: &Path, argv: &[String]) -> Self {
        let mut command = Vec::with_capacity(settings.flags.len() + argv.len() + 3);
        command.push(settings.tracer.clone());
        command.extend(settings.flags.iter().cloned());
        command.push("-o".to_string());
        command.push(log_path.display().to_string());
        command.extend(argv.iter().cloned());

        Self {
            name: PipelineStage::Tracing.name().to_string(),
            command,
            timeout_secs: 0,
        }
    }

    /// `<runtime> run --rm --name <name> --security-opt seccomp=<profile> <image> sh -c <workload>`
    pub fn validate(
        settings: &ValidateSettings,
        profile_path: &Path,
        workload: &str,
        container_name: &str,
    ) -> Self {
        let command = vec![
            settings.runtime.clone(),
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            container_name.to_string(),
            "--security-opt".to_string(),
            format!("seccomp={}", profile_path.display()),
            settings.image.clone(),
            "sh".to_string(),
            "-c".to_string(),
            workload.to_string(),
        ];

        Self {
            name: PipelineStage::Validating.name().to_string(),
            command,
            timeout_secs: settings.timeout_secs,
        }
    }

    /// Create a custom command.
    pub fn custom(name: String, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name,
            command,
            timeout_secs,
        }
    }

    /// The executable, if any.
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    /// Value following `flag` in the command, e.g. the tracer's `-o` path.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.command
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.command.get(i + 1))
            .map(String::as_str)
    }
}

/// The command being profiled.
///
/// The tracer execs `argv` directly while validation hands `line` to `sh -c`,
/// so the two must name the same words: `line` always splits back to `argv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    argv: Vec<String>,
    line: String,
}

impl Workload {
    /// Split a shell-style line such as `/bin/ls -la "/my dir"`.
    pub fn from_line(line: &str) -> Result<Self> {
        let argv = shlex::split(line).ok_or_else(|| PipelineError::CommandSyntax {
            line: line.to_string(),
        })?;
        if argv.is_empty() {
            return Err(PipelineError::EmptyCommand);
        }
        Ok(Self {
            argv,
            line: line.trim().to_string(),
        })
    }

    /// Quote an argv into a line the shell splits back into the same words.
    pub fn from_argv(argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() {
            return Err(PipelineError::EmptyCommand);
        }
        let line = shlex::try_join(argv.iter().map(String::as_str))
            .map_err(|_| PipelineError::CommandQuote)?;
        Ok(Self { argv, line })
    }

    /// Command-line words: one word is a shell line, several are an argv.
    pub fn from_args(args: Vec<String>) -> Result<Self> {
        match args.as_slice() {
            [line] => Self::from_line(line),
            _ => Self::from_argv(args),
        }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn line(&self) -> &str {
        &self.line
    }
}

/// Shell command run inside the validation container: the configured
/// override, else the workload's own line.
pub fn validation_workload(settings: &ValidateSettings, workload: &Workload) -> String {
    settings
        .command
        .clone()
        .unwrap_or_else(|| workload.line().to_string())
}

/// Fresh container name, `as-` plus 8 hex chars.
pub fn container_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("as-{}", &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::Tracing.name(), "tracing");
        assert_eq!(PipelineStage::Building.name(), "building");
        assert_eq!(PipelineStage::Writing.name(), "writing");
        assert_eq!(PipelineStage::Validating.name(), "validating");
        assert_eq!(PipelineStage::Done.to_string(), "done");
    }

    #[test]
    fn test_trace_command_layout() {
        let spec = CommandSpec::trace(
            &TraceSettings::default(),
            Path::new("/tmp/x/trace.log"),
            &argv(&["/bin/ls", "/"]),
        );
        assert_eq!(
            spec.command,
            argv(&["strace", "-f", "-qq", "-o", "/tmp/x/trace.log", "/bin/ls", "/"])
        );
        assert_eq!(spec.program(), Some("strace"));
        assert_eq!(spec.arg_after("-o"), Some("/tmp/x/trace.log"));
        assert_eq!(spec.timeout_secs, 0);
    }

    #[test]
    fn test_validate_command_layout() {
        let settings = ValidateSettings {
            timeout_secs: 30,
            ..ValidateSettings::default()
        };
        let spec = CommandSpec::validate(
            &settings,
            &PathBuf::from("/work/profile.json"),
            "ls /",
            "as-deadbeef",
        );
        assert_eq!(
            spec.command,
            argv(&[
                "docker",
                "run",
                "--rm",
                "--name",
                "as-deadbeef",
                "--security-opt",
                "seccomp=/work/profile.json",
                "busybox",
                "sh",
                "-c",
                "ls /",
            ])
        );
        assert_eq!(spec.timeout_secs, 30);
    }

    #[test]
    fn test_validation_workload_override() {
        let mut settings = ValidateSettings::default();
        let ls = Workload::from_argv(argv(&["ls", "-la", "/"])).unwrap();
        assert_eq!(validation_workload(&settings, &ls), "ls -la /");

        settings.command = Some("echo offline".to_string());
        assert_eq!(validation_workload(&settings, &ls), "echo offline");
    }

    #[test]
    fn test_workload_from_line_splits_quotes() {
        let w = Workload::from_line(r#"/bin/ls -la "/my dir""#).unwrap();
        assert_eq!(w.argv(), argv(&["/bin/ls", "-la", "/my dir"]).as_slice());
        assert_eq!(w.line(), r#"/bin/ls -la "/my dir""#);
    }

    #[test]
    fn test_workload_from_argv_quotes_for_the_shell() {
        let words = argv(&["sh", "-c", "echo a; touch /tmp/x", "it's"]);
        let w = Workload::from_argv(words.clone()).unwrap();
        assert_ne!(w.line(), words.join(" "));
        assert_eq!(shlex::split(w.line()).unwrap(), words);
    }

    #[test]
    fn test_workload_from_args_single_word_is_a_line() {
        let w = Workload::from_args(argv(&["/bin/ls /"])).unwrap();
        assert_eq!(w.argv(), argv(&["/bin/ls", "/"]).as_slice());

        let w = Workload::from_args(argv(&["/bin/ls", "/my dir"])).unwrap();
        assert_eq!(w.argv(), argv(&["/bin/ls", "/my dir"]).as_slice());
        assert_eq!(shlex::split(w.line()).unwrap(), w.argv());
    }

    #[test]
    fn test_workload_rejects_empty_and_unbalanced() {
        assert!(matches!(
            Workload::from_args(Vec::new()),
            Err(PipelineError::EmptyCommand)
        ));
        assert!(matches!(
            Workload::from_line("   "),
            Err(PipelineError::EmptyCommand)
        ));
        assert!(matches!(
            Workload::from_line("echo 'oops"),
            Err(PipelineError::CommandSyntax { .. })
        ));
        assert!(matches!(
            Workload::from_argv(argv(&["echo", "a\0b"])),
            Err(PipelineError::CommandQuote)
        ));
    }

    #[test]
    fn test_container_name_shape() {
        let name = container_name();
        assert!(name.starts_with("as-"));
        assert_eq!(name.len(), 11);
        assert!(name[3..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(name, container_name());
    }

    #[test]
    fn test_arg_after_missing() {
        let spec = CommandSpec::custom("x".into(), argv(&["echo", "-o"]), 0);
        assert_eq!(spec.arg_after("-o"), None);
        assert_eq!(spec.arg_after("--nope"), None);
    }
}
