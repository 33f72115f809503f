//! Best-effort classification of pipeline outcomes.
//!
//! A zero exit is always [`Outcome::Success`]. Otherwise rules are checked in
//! order against the captured diagnostics and the first match decides; with
//! no match the fallback applies. This is a text heuristic: a workload that
//! prints "Operation not permitted" for its own reasons is still reported as
//! a seccomp denial.

use std::fmt;

/// Final classification of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Validation exited 0.
    Success,

    /// The traced command failed; nothing was written.
    TraceAborted,

    /// Validation failed with signs of a seccomp denial.
    SeccompDenied,

    /// Validation failed for some other reason (often DNS or network).
    OtherFailure,
}

impl Outcome {
    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::TraceAborted => "trace_aborted",
            Outcome::SeccompDenied => "seccomp_denied",
            Outcome::OtherFailure => "other_failure",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Text predicate over captured diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// Case-sensitive substring.
    Contains(String),

    /// ASCII case-insensitive substring.
    ContainsIgnoreCase(String),
}

impl Marker {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Marker::Contains(needle) => text.contains(needle.as_str()),
            Marker::ContainsIgnoreCase(needle) => text
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
        }
    }
}

/// A marker and the outcome it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierRule {
    pub marker: Marker,
    pub outcome: Outcome,
}

impl ClassifierRule {
    pub fn new(marker: Marker, outcome: Outcome) -> Self {
        Self { marker, outcome }
    }
}

/// Ordered, first-match-wins rules for non-zero validation exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    rules: Vec<ClassifierRule>,
    fallback: Outcome,
}

impl Classifier {
    /// No rules; every non-zero exit maps to `fallback`.
    pub fn empty(fallback: Outcome) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    /// EPERM text, permission denials and any mention of seccomp count as
    /// [`Outcome::SeccompDenied`]; everything else is [`Outcome::OtherFailure`].
    pub fn standard() -> Self {
        Self::empty(Outcome::OtherFailure)
            .with_rule(ClassifierRule::new(
                Marker::Contains("Operation not permitted".to_string()),
                Outcome::SeccompDenied,
            ))
            .with_rule(ClassifierRule::new(
                Marker::ContainsIgnoreCase("permission denied".to_string()),
                Outcome::SeccompDenied,
            ))
            .with_rule(ClassifierRule::new(
                Marker::ContainsIgnoreCase("seccomp".to_string()),
                Outcome::SeccompDenied,
            ))
    }

    /// Append a rule and return `self` (builder pattern).
    pub fn with_rule(mut self, rule: ClassifierRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// Classify a finished validation run.
    pub fn classify(&self, exit_code: i32, diagnostics: &str) -> Outcome {
        if exit_code == 0 {
            return Outcome::Success;
        }
        self.rules
            .iter()
            .find(|rule| rule.marker.matches(diagnostics))
            .map(|rule| rule.outcome)
            .unwrap_or(self.fallback)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::standard()
    }
}
