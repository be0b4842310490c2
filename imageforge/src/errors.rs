//! Error types for the imageforge build core.
//!
//! Failures carry a closed classification taxonomy so terminal reports can
//! name a likely root cause category instead of dumping raw tool output.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Root cause category for a stage failure.
///
/// This is a closed set; anything that cannot be classified lands in
/// `Unknown` and keeps its raw diagnostic text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Disk space or memory exhaustion.
    ResourceExhausted,
    /// A stale mount, handle, or lock held by another process.
    LockContention,
    /// Elevation, ACL, or antivirus interference.
    PermissionDenied,
    /// A required service or tool is missing or unhealthy.
    DependencyUnavailable,
    /// Unclassified failure; raw diagnostic text is always attached.
    #[default]
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceExhausted => write!(f, "resource exhausted"),
            Self::LockContention => write!(f, "lock contention"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::DependencyUnavailable => write!(f, "dependency unavailable"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Which part of a stage produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePhase {
    /// The pre-flight precondition check failed.
    Precondition,
    /// The main action failed.
    Action,
    /// A best-effort remediation step failed (never terminal on its own).
    Remediation,
}

impl fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precondition => write!(f, "precondition"),
            Self::Action => write!(f, "action"),
            Self::Remediation => write!(f, "remediation"),
        }
    }
}

/// A classified failure raised by a stage's precondition or action.
///
/// `fatal` failures skip all remaining retries; retryable failures are
/// retried until the stage's attempt budget is exhausted.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{phase} failed ({kind}): {detail}")]
pub struct StageFailure {
    /// Root cause classification.
    pub kind: FailureKind,
    /// Which phase of the stage produced this failure.
    pub phase: FailurePhase,
    /// Raw diagnostic text for user display.
    pub detail: String,
    /// Whether the failure is non-retryable.
    pub fatal: bool,
}

impl StageFailure {
    /// Creates a retryable action failure.
    #[must_use]
    pub fn retryable(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            phase: FailurePhase::Action,
            detail: detail.into(),
            fatal: false,
        }
    }

    /// Creates a fatal action failure that skips remaining retries.
    #[must_use]
    pub fn fatal(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            phase: FailurePhase::Action,
            detail: detail.into(),
            fatal: true,
        }
    }

    /// Creates a precondition failure.
    ///
    /// Precondition failures always bypass retry and fail the stage
    /// terminally; the `fatal` flag only governs action failures.
    #[must_use]
    pub fn precondition(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            phase: FailurePhase::Precondition,
            detail: detail.into(),
            fatal: true,
        }
    }

    /// Marks the failure as retryable.
    #[must_use]
    pub fn into_retryable(mut self) -> Self {
        self.fatal = false;
        self
    }

    /// Sets the phase.
    #[must_use]
    pub fn with_phase(mut self, phase: FailurePhase) -> Self {
        self.phase = phase;
        self
    }
}

/// The main error type for imageforge operations.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The pipeline definition is invalid (empty, or a stage with a zero
    /// attempt budget).
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// The build configuration could not be loaded or is malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The run was cancelled before completion.
    #[error("build cancelled: {0}")]
    Cancelled(String),

    /// Report serialization failed.
    #[error("report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::ResourceExhausted.to_string(), "resource exhausted");
        assert_eq!(FailureKind::LockContention.to_string(), "lock contention");
        assert_eq!(FailureKind::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_failure_kind_serialize() {
        let json = serde_json::to_string(&FailureKind::DependencyUnavailable).unwrap();
        assert_eq!(json, r#""dependency_unavailable""#);

        let back: FailureKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FailureKind::DependencyUnavailable);
    }

    #[test]
    fn test_stage_failure_display() {
        let failure = StageFailure::retryable(FailureKind::LockContention, "handle in use");
        assert_eq!(failure.to_string(), "action failed (lock contention): handle in use");
    }

    #[test]
    fn test_stage_failure_constructors() {
        let retryable = StageFailure::retryable(FailureKind::Unknown, "x");
        assert!(!retryable.fatal);
        assert_eq!(retryable.phase, FailurePhase::Action);

        let fatal = StageFailure::fatal(FailureKind::ResourceExhausted, "disk full");
        assert!(fatal.fatal);

        let pre = StageFailure::precondition(FailureKind::DependencyUnavailable, "tool missing");
        assert!(pre.fatal);
        assert_eq!(pre.phase, FailurePhase::Precondition);

        let soft_pre = pre.into_retryable();
        assert!(!soft_pre.fatal);
    }
}
