//! Syscall extraction from `strace -f` logs.
//!
//! Each matching line looks like `<pid> [<secs>.<frac>] <name>(...`. Anything
//! else (continuation lines, `--- SIG... ---`, `+++ exited ... +++`,
//! `<... resumed>`) is skipped. Only presence matters, so the result is a set.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::{ProfileError, Result};
use crate::SyscallSet;

fn call_regex() -> &'static Regex {
    static CALL_RE: OnceLock<Regex> = OnceLock::new();
    CALL_RE.get_or_init(|| {
        Regex::new(r"^\s*\d+(?:\s+\d+\.\d+)?\s+([a-zA-Z0-9_]+)\(")
            .expect("syscall line pattern is a valid regex")
    })
}

/// Extract the syscall name from a single trace line, if the line is a call.
pub fn syscall_from_line(line: &str) -> Option<&str> {
    call_regex()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Iterate over every syscall name found at the start of the given lines.
pub fn iter_syscalls<'a, I>(lines: I) -> impl Iterator<Item = &'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    lines.into_iter().filter_map(syscall_from_line)
}

/// Collect the distinct syscalls in a trace stream.
///
/// Invalid UTF-8 is replaced rather than rejected, and a read error midway
/// through the stream (e.g. a truncated file) ends parsing with whatever was
/// collected so far.
pub fn parse_trace<R: Read>(reader: R) -> SyscallSet {
    let mut reader = BufReader::new(reader);
    let mut syscalls = SyscallSet::new();
    let mut buf = Vec::new();
    let mut lines = 0usize;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                lines += 1;
                let line = String::from_utf8_lossy(&buf);
                if let Some(name) = syscall_from_line(&line) {
                    if !syscalls.contains(name) {
                        syscalls.insert(name.to_string());
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "trace stream ended early");
                break;
            }
        }
    }

    debug!(lines, unique = syscalls.len(), "parsed trace stream");
    syscalls
}

/// Open a trace log and collect its distinct syscalls.
///
/// Only failing to open the file is an error; its contents are parsed leniently.
pub fn parse_trace_file(path: &Path) -> Result<SyscallSet> {
    let file = std::fs::File::open(path).map_err(|source| ProfileError::TraceRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_trace(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_with_pid_and_timestamp() {
        assert_eq!(
            syscall_from_line("123 0.000123 openat(AT_FDCWD, \"/etc/ld.so.cache\", O_RDONLY) = 3"),
            Some("openat")
        );
    }

    #[test]
    fn test_line_with_pid_only() {
        assert_eq!(syscall_from_line("4711  execve(\"/bin/ls\", [\"ls\"], 0x7ff) = 0"), Some("execve"));
    }

    #[test]
    fn test_leading_whitespace_allowed() {
        assert_eq!(syscall_from_line("   42 1.5 read(3, \"\", 4096) = 0"), Some("read"));
    }

    #[test]
    fn test_non_call_lines_skipped() {
        assert_eq!(syscall_from_line("--- SIGCHLD {si_signo=SIGCHLD} ---"), None);
        assert_eq!(syscall_from_line("123 +++ exited with 0 +++"), None);
        assert_eq!(syscall_from_line("123 <... read resumed>\"x\", 1) = 1"), None);
        assert_eq!(syscall_from_line("openat(AT_FDCWD, \"x\") = 3"), None);
        assert_eq!(syscall_from_line(""), None);
    }

    #[test]
    fn test_name_must_touch_paren() {
        assert_eq!(syscall_from_line("123 read (3)"), None);
    }

    #[test]
    fn test_spec_scenario_lines() {
        let log = "123 0.000123 openat(...)\n123 0.000456 read(...)\n--- SIGCHLD {...}\n";
        let set = parse_trace(log.as_bytes());
        let expected: SyscallSet = ["openat", "read"].iter().map(|s| s.to_string()).collect();
        assert_eq!(set, expected);
    }

    #[test]
    fn test_duplicates_collapse() {
        let log = "1 read(0)\n1 read(0)\n2 write(1)\n1 read(0)\n";
        let set = parse_trace(log.as_bytes());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let mut log = b"1 0.1 openat(\"".to_vec();
        log.extend_from_slice(&[0xff, 0xfe, 0xfd]);
        log.extend_from_slice(b"\") = 3\n\xc3\x28 garbage\n2 0.2 close(3) = 0");
        let set = parse_trace(log.as_slice());
        assert!(set.contains("openat"));
        assert!(set.contains("close"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_iter_syscalls_preserves_order_and_repeats() {
        let lines = ["1 brk(NULL)", "noise", "1 brk(0x1)", "1 mmap(NULL)"];
        let names: Vec<&str> = iter_syscalls(lines).collect();
        assert_eq!(names, vec!["brk", "brk", "mmap"]);
    }

    #[test]
    fn test_parse_trace_file_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_trace_file(&dir.path().join("absent.log")).unwrap_err();
        assert!(matches!(err, ProfileError::TraceRead { .. }));
    }

    #[test]
    fn test_parse_trace_file_reads_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.log");
        std::fs::write(&path, "9 0.0 getpid() = 9\n9 0.1 exit_group(0) = ?\n").unwrap();
        let set = parse_trace_file(&path).unwrap();
        assert!(set.contains("getpid"));
        assert!(set.contains("exit_group"));
    }
}
