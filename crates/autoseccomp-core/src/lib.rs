//! AutoSeccomp core: turn `strace` logs into seccomp allow-list profiles.
//!
//! - [`parser`] — syscall names from a trace log
//! - [`baseline`] — runtime default allow-list, must-have overlay, no-network rule
//! - [`profile`] — merge traced syscalls with the baseline
//! - [`writer`] — canonical, atomic profile persistence
//! - [`config`] — `config.toml` and `AUTOSECCOMP_*` settings
//! - [`telemetry`] — tracing subscriber setup

use std::collections::BTreeSet;

pub mod baseline;
pub mod config;
pub mod error;
pub mod parser;
pub mod profile;
pub mod telemetry;
pub mod writer;

/// A set of syscall names. Iteration order is lexicographic.
pub type SyscallSet = BTreeSet<String>;

pub use baseline::{
    system_sources, BaselineOrigin, BaselinePolicy, BaselineSource, RuntimeProfileFile,
    StaticSource, EMBEDDED_DEFAULT, MUST_HAVE, NETWORK_SYSCALLS,
};
pub use config::Settings;
pub use error::{ProfileError, Result};
pub use parser::{parse_trace, parse_trace_file, syscall_from_line};
pub use profile::{build_profile, traced_network_syscalls, Profile, SeccompAction};
pub use telemetry::init_tracing;
pub use writer::{save_profile, ProfileDigest};
