//! Baseline allow-list: what a container may always do, before any trace.
//!
//! The default allow-list comes from the first [`BaselineSource`] that yields
//! a non-empty set (normally the container runtime's own seccomp profile),
//! falling back to [`EMBEDDED_DEFAULT`]. [`MUST_HAVE`] is always added and
//! [`NETWORK_SYSCALLS`] always removed:
//!
//! ```text
//! effective = (default_allowlist ∪ MUST_HAVE) \ NETWORK_SYSCALLS
//! ```
//!
//! Resolution never fails. A source that is missing, unreadable, or
//! malformed counts as absent.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, info};

use crate::SyscallSet;

/// Well-known locations of the runtime's default seccomp profile, in lookup order.
pub const RUNTIME_PROFILE_PATHS: &[&str] = &[
    "/usr/share/docker/seccomp.json",
    "/usr/share/containers/oci/seccomp.json",
];

/// Syscalls runc, libcontainer and the Go runtime need even when the
/// runtime's own profile is older than the kernel.
pub const MUST_HAVE: &[&str] = &[
    // synchronization
    "futex",
    "futex_time64",
    "futex_waitv",
    // path resolution and metadata
    "openat2",
    "fstatfs",
    "statx",
    "close_range",
    "newfstatat",
    "readlinkat",
    // credentials and capabilities
    "capget",
    "capset",
    "prctl",
    // thread bookkeeping
    "set_tid_address",
    "set_robust_list",
    "prlimit64",
    "sched_yield",
    "rseq",
];

/// Socket family calls. Removed from the baseline so profiles start with no network.
pub const NETWORK_SYSCALLS: &[&str] = &[
    "socket",
    "socketpair",
    "bind",
    "connect",
    "accept",
    "accept4",
    "listen",
    "getsockname",
    "getpeername",
    "sendto",
    "recvfrom",
    "sendmsg",
    "recvmsg",
    "shutdown",
    "setsockopt",
    "getsockopt",
];

/// Fallback allow-list covering container init plus common userspace.
pub const EMBEDDED_DEFAULT: &[&str] = &[
    // process, memory, signals
    "brk",
    "clone",
    "clone3",
    "close",
    "close_range",
    "execve",
    "exit_group",
    "fstat",
    "newfstatat",
    "statx",
    "statfs",
    "fstatfs",
    "getdents64",
    "getpid",
    "getppid",
    "getuid",
    "getgid",
    "geteuid",
    "getegid",
    "set_tid_address",
    "set_robust_list",
    "mmap",
    "mprotect",
    "munmap",
    "prctl",
    "rt_sigaction",
    "rt_sigprocmask",
    "rt_sigreturn",
    "sigaltstack",
    "setrlimit",
    "read",
    "write",
    "lseek",
    "sched_yield",
    "rseq",
    // synchronization
    "futex",
    "futex_time64",
    "futex_waitv",
    // file system
    "open",
    "openat",
    "openat2",
    "fcntl",
    "ioctl",
    "getrandom",
    "faccessat",
    "readlink",
    "readlinkat",
    "chmod",
    "fchmod",
    "fchmodat",
    "linkat",
    "unlinkat",
    "renameat2",
    "utimensat",
    "ftruncate",
    // event notification
    "epoll_create1",
    "epoll_ctl",
    "epoll_pwait",
    "epoll_wait",
    "eventfd2",
    // directories and namespaces
    "chdir",
    "getcwd",
    "setns",
    "umask",
    // credentials, limits, capabilities
    "setuid",
    "setuid32",
    "setgid",
    "setgid32",
    "setresuid",
    "setresgid",
    "setfsuid",
    "setfsuid32",
    "setfsgid",
    "setfsgid32",
    "setgroups",
    "setgroups32",
    "getgroups",
    "getgroups32",
    "capget",
    "capset",
    "prlimit64",
    // pidfd helpers
    "pidfd_open",
    "pidfd_getfd",
    "pidfd_send_signal",
    // timers
    "timerfd_create",
    "timerfd_settime",
    "timerfd_gettime",
];

fn to_set(names: &[&str]) -> SyscallSet {
    names.iter().map(|s| s.to_string()).collect()
}

/// A candidate provider of the default allow-list.
///
/// `load` returns `None` when the source is absent or unusable; it must not
/// panic or surface errors.
pub trait BaselineSource {
    /// Human-readable identity used in logs and provenance.
    fn name(&self) -> String;

    /// The allow-listed syscalls, or `None` when unavailable.
    fn load(&self) -> Option<SyscallSet>;
}

#[derive(Debug, Deserialize)]
struct RuntimeProfileDoc {
    #[serde(default)]
    syscalls: Vec<RuntimeProfileRule>,
}

#[derive(Debug, Deserialize)]
struct RuntimeProfileRule {
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    action: String,
}

/// A seccomp profile on disk in the Docker/OCI JSON layout.
///
/// Every name listed under an `SCMP_ACT_ALLOW` rule is collected. A file that
/// lists no allowed names is treated as absent.
#[derive(Debug, Clone)]
pub struct RuntimeProfileFile {
    path: PathBuf,
}

impl RuntimeProfileFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BaselineSource for RuntimeProfileFile {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Option<SyscallSet> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "baseline source unavailable");
                return None;
            }
        };

        let doc: RuntimeProfileDoc = match serde_json::from_slice(&bytes) {
            Ok(d) => d,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "baseline source malformed");
                return None;
            }
        };

        let names: SyscallSet = doc
            .syscalls
            .into_iter()
            .filter(|rule| rule.action == crate::profile::ALLOW_ACTION)
            .flat_map(|rule| rule.names)
            .collect();

        if names.is_empty() {
            debug!(path = %self.path.display(), "baseline source has no allowed syscalls");
            None
        } else {
            Some(names)
        }
    }
}

/// A fixed in-memory source, mainly for tests and embedding.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    names: Option<SyscallSet>,
}

impl StaticSource {
    pub fn new<I, S>(name: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            names: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    /// A source that never yields anything.
    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            names: None,
        }
    }
}

impl BaselineSource for StaticSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn load(&self) -> Option<SyscallSet> {
        self.names.clone().filter(|n| !n.is_empty())
    }
}

/// The runtime profile files from [`RUNTIME_PROFILE_PATHS`], in order.
pub fn system_sources() -> Vec<Box<dyn BaselineSource>> {
    RUNTIME_PROFILE_PATHS
        .iter()
        .map(|p| Box::new(RuntimeProfileFile::new(*p)) as Box<dyn BaselineSource>)
        .collect()
}

/// Where the default allow-list came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineOrigin {
    /// A source that resolved successfully, by name.
    Source(String),
    /// The built-in [`EMBEDDED_DEFAULT`] list.
    Embedded,
}

impl fmt::Display for BaselineOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaselineOrigin::Source(name) => write!(f, "{}", name),
            BaselineOrigin::Embedded => write!(f, "embedded default"),
        }
    }
}

/// The resolved, immutable baseline.
///
/// Build one per process with [`BaselinePolicy::resolve`] (or
/// [`BaselinePolicy::system`]) and share it by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselinePolicy {
    origin: BaselineOrigin,
    default_allowlist: SyscallSet,
    must_have: SyscallSet,
    network_syscalls: SyscallSet,
    effective: SyscallSet,
}

impl BaselinePolicy {
    /// Try each source in order; the first that loads wins.
    pub fn resolve(sources: &[Box<dyn BaselineSource>]) -> Self {
        for source in sources {
            if let Some(names) = source.load() {
                let policy = Self::from_allowlist(BaselineOrigin::Source(source.name()), names);
                info!(
                    origin = %policy.origin,
                    default = policy.default_allowlist.len(),
                    effective = policy.effective.len(),
                    "resolved baseline"
                );
                return policy;
            }
        }

        let policy = Self::embedded();
        info!(
            origin = %policy.origin,
            effective = policy.effective.len(),
            "no runtime profile found, using embedded baseline"
        );
        policy
    }

    /// Resolve against the well-known runtime profile locations.
    pub fn system() -> Self {
        Self::resolve(&system_sources())
    }

    /// Baseline built from [`EMBEDDED_DEFAULT`] alone.
    pub fn embedded() -> Self {
        Self::from_allowlist(BaselineOrigin::Embedded, to_set(EMBEDDED_DEFAULT))
    }

    /// Baseline built from an explicit default allow-list.
    pub fn from_allowlist(origin: BaselineOrigin, default_allowlist: SyscallSet) -> Self {
        let must_have = to_set(MUST_HAVE);
        let network_syscalls = to_set(NETWORK_SYSCALLS);

        let effective = default_allowlist
            .union(&must_have)
            .filter(|name| !network_syscalls.contains(*name))
            .cloned()
            .collect();

        Self {
            origin,
            default_allowlist,
            must_have,
            network_syscalls,
            effective,
        }
    }

    pub fn origin(&self) -> &BaselineOrigin {
        &self.origin
    }

    pub fn default_allowlist(&self) -> &SyscallSet {
        &self.default_allowlist
    }

    pub fn must_have(&self) -> &SyscallSet {
        &self.must_have
    }

    pub fn network_syscalls(&self) -> &SyscallSet {
        &self.network_syscalls
    }

    /// `(default_allowlist ∪ must_have) \ network_syscalls`.
    pub fn effective_baseline(&self) -> &SyscallSet {
        &self.effective
    }
}
