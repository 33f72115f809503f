//! Seccomp profile document and the trace + baseline merge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::baseline::BaselinePolicy;
use crate::error::Result;
use crate::SyscallSet;

/// Action string for the single allow rule (and for reading runtime profiles).
pub const ALLOW_ACTION: &str = "SCMP_ACT_ALLOW";

/// Provenance comment written into every generated rule.
pub const PROFILE_COMMENT: &str =
    "AutoSeccomp-Gen (runtime default minus NET + trace + MUST_HAVE)";

/// Seccomp action applied to a rule or as the profile default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SeccompAction {
    /// Fail the call with an errno; the default-deny posture.
    #[serde(rename = "SCMP_ACT_ERRNO")]
    Errno,

    #[serde(rename = "SCMP_ACT_ALLOW")]
    Allow,
}

/// Architectures every generated profile targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Architecture {
    #[serde(rename = "SCMP_ARCH_AARCH64")]
    Aarch64,

    #[serde(rename = "SCMP_ARCH_X86_64")]
    X86_64,
}

/// One `archMap` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArchEntry {
    pub architecture: Architecture,
    pub sub_architectures: Vec<String>,
}

impl ArchEntry {
    fn bare(architecture: Architecture) -> Self {
        Self {
            architecture,
            sub_architectures: Vec::new(),
        }
    }
}

/// One entry of the `syscalls` list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyscallRule {
    /// Sorted, de-duplicated syscall names.
    pub names: Vec<String>,
    pub action: SeccompAction,
    pub args: Vec<Value>,
    pub comment: String,
    pub includes: Map<String, Value>,
    pub excludes: Map<String, Value>,
}

/// A complete seccomp profile in the Docker/OCI JSON layout.
///
/// Field order here is the serialized key order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub default_action: SeccompAction,
    pub arch_map: Vec<ArchEntry>,
    pub syscalls: Vec<SyscallRule>,
}

impl Profile {
    /// Names permitted by the profile's allow rule.
    pub fn allowed_names(&self) -> &[String] {
        self.syscalls
            .iter()
            .find(|rule| rule.action == SeccompAction::Allow)
            .map(|rule| rule.names.as_slice())
            .unwrap_or(&[])
    }

    /// Canonical text form: two-space indented JSON with a trailing newline.
    pub fn to_canonical_json(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

/// Merge traced syscalls with the baseline into a profile.
///
/// The allow rule lists `traced ∪ effective_baseline`. Traced network calls
/// are kept: the baseline only drops them from the default posture.
pub fn build_profile(traced: &SyscallSet, baseline: &BaselinePolicy) -> Profile {
    let allowed: Vec<String> = traced
        .union(baseline.effective_baseline())
        .cloned()
        .collect();

    Profile {
        default_action: SeccompAction::Errno,
        arch_map: vec![
            ArchEntry::bare(Architecture::Aarch64),
            ArchEntry::bare(Architecture::X86_64),
        ],
        syscalls: vec![SyscallRule {
            names: allowed,
            action: SeccompAction::Allow,
            args: Vec::new(),
            comment: PROFILE_COMMENT.to_string(),
            includes: Map::new(),
            excludes: Map::new(),
        }],
    }
}

/// Traced syscalls that the baseline deliberately leaves out for being network calls.
pub fn traced_network_syscalls(traced: &SyscallSet, baseline: &BaselinePolicy) -> SyscallSet {
    traced
        .intersection(baseline.network_syscalls())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::{BaselineOrigin, MUST_HAVE, NETWORK_SYSCALLS};

    fn set(names: &[&str]) -> SyscallSet {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn small_baseline() -> BaselinePolicy {
        BaselinePolicy::from_allowlist(
            BaselineOrigin::Source("test".into()),
            set(&["read", "write", "socket"]),
        )
    }

    #[test]
    fn test_empty_trace_is_baseline_alone() {
        let baseline = small_baseline();
        let profile = build_profile(&SyscallSet::new(), &baseline);
        let allowed: SyscallSet = profile.allowed_names().iter().cloned().collect();
        assert_eq!(&allowed, baseline.effective_baseline());
    }

    #[test]
    fn test_names_sorted_and_unique() {
        let profile = build_profile(&set(&["zzz_call", "read", "aaa_call"]), &small_baseline());
        let names = profile.allowed_names();
        let mut sorted = names.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted.as_slice());
    }

    #[test]
    fn test_traced_is_subset_of_allowed() {
        let traced = set(&["openat", "mount", "read"]);
        let profile = build_profile(&traced, &small_baseline());
        for name in &traced {
            assert!(profile.allowed_names().contains(name));
        }
    }

    #[test]
    fn test_must_have_in_final_allow_list() {
        let profile = build_profile(&set(&["read"]), &small_baseline());
        for name in MUST_HAVE {
            assert!(profile.allowed_names().iter().any(|n| n == name));
        }
    }

    #[test]
    fn test_traced_network_calls_survive_merge() {
        let baseline = small_baseline();
        let traced = set(&["connect", "read"]);
        let profile = build_profile(&traced, &baseline);
        assert!(profile.allowed_names().iter().any(|n| n == "connect"));
        assert!(!profile.allowed_names().iter().any(|n| n == "socket"));
        assert_eq!(traced_network_syscalls(&traced, &baseline), set(&["connect"]));
    }

    #[test]
    fn test_untraced_network_calls_absent() {
        let profile = build_profile(&set(&["read"]), &BaselinePolicy::embedded());
        for name in NETWORK_SYSCALLS {
            assert!(!profile.allowed_names().iter().any(|n| n == name));
        }
    }

    #[test]
    fn test_serialization_is_byte_identical() {
        let traced = set(&["openat", "read", "execve"]);
        let a = build_profile(&traced, &small_baseline()).to_canonical_json().unwrap();
        let b = build_profile(&traced, &small_baseline()).to_canonical_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_document_layout() {
        let profile = build_profile(&set(&["read"]), &small_baseline());
        let value: Value = serde_json::from_str(&profile.to_canonical_json().unwrap()).unwrap();

        assert_eq!(value["defaultAction"], "SCMP_ACT_ERRNO");
        assert_eq!(value["archMap"][0]["architecture"], "SCMP_ARCH_AARCH64");
        assert_eq!(value["archMap"][1]["architecture"], "SCMP_ARCH_X86_64");
        assert_eq!(value["archMap"][0]["subArchitectures"], serde_json::json!([]));

        let rules = value["syscalls"].as_array().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0]["action"], "SCMP_ACT_ALLOW");
        assert_eq!(rules[0]["args"], serde_json::json!([]));
        assert_eq!(rules[0]["includes"], serde_json::json!({}));
        assert_eq!(rules[0]["excludes"], serde_json::json!({}));
        assert_eq!(rules[0]["comment"], PROFILE_COMMENT);
    }

    #[test]
    fn test_key_order_is_stable() {
        let text = build_profile(&set(&["read"]), &small_baseline())
            .to_canonical_json()
            .unwrap();
        let default_at = text.find("\"defaultAction\"").unwrap();
        let arch_at = text.find("\"archMap\"").unwrap();
        let syscalls_at = text.find("\"syscalls\"").unwrap();
        assert!(default_at < arch_at && arch_at < syscalls_at);
        assert!(text.starts_with("{\n  \"defaultAction\""));
        assert!(text.ends_with("}\n"));
    }
}
