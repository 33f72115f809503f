//! AutoSeccomp - seccomp profiles from observed syscalls
//!
//! The `autoseccomp` command traces a workload, turns the syscalls it makes
//! into a Docker-compatible seccomp profile, and checks the profile by
//! re-running the workload in a restricted container.
//!
//! ## Commands
//!
//! - `trace`: List the unique syscalls in an existing strace log
//! - `generate`: Write a profile from an existing strace log
//! - `trace-run`: Trace a command, write its profile, and validate it
//! - `doctor`: Check that the tracer and container runtime are usable

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, Level};

use autoseccomp_core::config::UiSettings;
use autoseccomp_core::{build_profile, parse_trace_file, save_profile, BaselinePolicy, Settings};
use autoseccomp_pipeline::{
    CommandRunner, CommandSpec, Outcome, PipelineOrchestrator, PipelineResult, ProcessRunner,
    Workload,
};

#[derive(Parser)]
#[command(name = "autoseccomp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate seccomp profiles from strace output", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Settings file (default: XDG/home/system config locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the unique syscalls in an strace log
    Trace {
        /// Path to the strace log
        log: PathBuf,
    },

    /// Write a seccomp profile from an strace log
    Generate {
        /// Path to the strace log
        log: PathBuf,

        /// Output path for the profile
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Trace a command, write its profile and validate it in a container
    TraceRun {
        /// Output path for the profile
        #[arg(short, long)]
        out: PathBuf,

        /// Exit 1 when validation does not succeed
        #[arg(long)]
        strict: bool,

        /// Command to trace: one quoted shell-style string, or its words
        /// (put them after `--` when they start with `-`)
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,
    },

    /// Check that the tracer and container runtime can be run
    Doctor,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    autoseccomp_core::init_tracing(cli.json, level);

    let settings =
        Settings::load(cli.config.as_deref()).context("Failed to load AutoSeccomp settings")?;

    match cli.command {
        Commands::Trace { log } => cmd_trace(&log),
        Commands::Generate { log, out } => cmd_generate(&log, &out, &BaselinePolicy::system()),
        Commands::TraceRun {
            out,
            strict,
            command,
        } => {
            let workload = Workload::from_args(command).context("Invalid command to trace")?;
            let code = cmd_trace_run(settings, &workload, &out, strict).await?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::Doctor => cmd_doctor(&ProcessRunner::new(), &settings).await,
    }
}

/// List unique syscalls in a trace log
fn cmd_trace(log: &Path) -> Result<()> {
    let syscalls = parse_trace_file(log)
        .with_context(|| format!("Failed to read trace log {}", log.display()))?;

    println!("Total unique syscalls: {}", syscalls.len());
    for name in &syscalls {
        println!("- {}", name);
    }

    Ok(())
}

/// Build and write a profile from a trace log
fn cmd_generate(log: &Path, out: &Path, baseline: &BaselinePolicy) -> Result<()> {
    let traced = parse_trace_file(log)
        .with_context(|| format!("Failed to read trace log {}", log.display()))?;
    debug!(baseline = %baseline.origin(), traced = traced.len(), "building profile");

    let profile = build_profile(&traced, baseline);
    let digest = save_profile(&profile, out)
        .with_context(|| format!("Failed to write profile {}", out.display()))?;

    println!("Profile written -> {}", out.display());
    println!(
        "  {} syscalls allowed ({} traced, baseline: {})",
        profile.allowed_names().len(),
        traced.len(),
        baseline.origin()
    );
    println!("  sha256: {}", digest);

    Ok(())
}

/// Run the full pipeline and return the process exit code
async fn cmd_trace_run(
    settings: Settings,
    workload: &Workload,
    out: &Path,
    strict: bool,
) -> Result<i32> {
    if let Some(header) = header_line(&settings.ui) {
        println!("{}", header);
    }
    let orchestrator = PipelineOrchestrator::new(
        Arc::new(ProcessRunner::new()),
        Arc::new(BaselinePolicy::system()),
        settings,
    );

    let result = orchestrator
        .run(workload, out)
        .await
        .context("Pipeline failed")?;

    print_result(&result);
    if !result.aborted() {
        println!("  baseline: {}", orchestrator.baseline().origin());
    }
    Ok(result.process_exit_code(strict))
}

fn print_result(result: &PipelineResult) {
    if result.aborted() {
        println!(
            "✗ Traced command failed (exit {}); no profile written",
            result.exit_code
        );
        print_diagnostics(&result.raw_diagnostics);
        return;
    }

    if let Some(path) = &result.profile_path {
        println!("Profile written -> {}", path.display());
    }
    println!(
        "  {} syscalls allowed ({} traced)",
        result.allowed_count,
        result.traced.len()
    );
    if let Some(digest) = &result.digest {
        println!("  sha256: {}", digest);
    }

    match result.outcome {
        Outcome::Success => println!("✓ Validation passed"),
        Outcome::SeccompDenied => {
            println!(
                "✗ Validation failed (exit {}): likely blocked by seccomp",
                result.exit_code
            );
            print_diagnostics(&result.raw_diagnostics);
        }
        Outcome::OtherFailure => {
            println!(
                "✗ Validation failed (exit {}): not seccomp related (network or DNS?)",
                result.exit_code
            );
            print_diagnostics(&result.raw_diagnostics);
        }
        Outcome::TraceAborted => {}
    }
    println!("  ({}ms)", result.duration_ms);
}

fn print_diagnostics(text: &str) {
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        println!("    {}", line);
    }
}

/// Report whether the external tools are runnable
async fn cmd_doctor(runner: &dyn CommandRunner, settings: &Settings) -> Result<()> {
    if let Some(header) = header_line(&settings.ui) {
        println!("{}", header);
        println!();
    }

    let tools = [
        ("tracer", settings.trace.tracer.as_str()),
        ("runtime", settings.validate.runtime.as_str()),
    ];
    let mut missing = 0;
    for (role, program) in tools {
        match tool_version(runner, program).await {
            Some(version) => println!("  ✓ {:<8} {} ({})", role, program, version),
            None => {
                missing += 1;
                println!("  ✗ {:<8} {} (not runnable)", role, program);
            }
        }
    }

    println!();
    println!("  validation image: {}", settings.validate.image);
    if let Some(cmd) = &settings.validate.command {
        println!("  validation command override: {}", cmd);
    }

    if missing > 0 {
        anyhow::bail!("{} required tool(s) unavailable", missing);
    }
    Ok(())
}

/// One-line version header, with the author when configured. `None` when the
/// banner is switched off.
fn header_line(ui: &UiSettings) -> Option<String> {
    if !ui.banner {
        return None;
    }
    let mut line = format!("AutoSeccomp v{}", env!("CARGO_PKG_VERSION"));
    if let Some(author) = &ui.author {
        line.push_str(&format!(" by {}", author));
    }
    Some(line)
}

/// First non-empty output line of `<program> --version`, if it exits 0.
async fn tool_version(runner: &dyn CommandRunner, program: &str) -> Option<String> {
    let spec = CommandSpec::custom(
        format!("{} --version", program),
        vec![program.to_string(), "--version".to_string()],
        10,
    );
    let output = runner.run(&spec).await.ok()?;
    if !output.success() {
        return None;
    }
    let text = if output.stdout.trim().is_empty() {
        &output.stderr
    } else {
        &output.stdout
    };
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}
