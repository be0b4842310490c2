//! Build run reports.
//!
//! A [`BuildReport`] is created when a pipeline run starts, appended to as
//! stages finish, finalized once, and never mutated afterward. It is the
//! only channel through which run results reach the caller; stages share
//! no other state across the run.

use crate::errors::{ForgeError, StageFailure};
use crate::stage::RemediationOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Terminal status of one stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage completed successfully.
    Ok,
    /// Stage failed terminally (attempts exhausted or fatal failure).
    Failed,
    /// Stage never ran because an earlier stage failed terminally.
    Skipped,
    /// Stage was interrupted by cancellation.
    Cancelled,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status counts toward overall success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Overall status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every stage completed successfully.
    Succeeded,
    /// A stage failed terminally.
    Failed,
    /// The run was cancelled before completion.
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one execution attempt of a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResult {
    /// Whether the attempt succeeded.
    pub success: bool,
    /// The classified failure, when the attempt did not succeed.
    pub failure: Option<StageFailure>,
    /// Remediation run after this failed attempt, if any.
    pub remediation: Option<RemediationOutcome>,
    /// Attempt duration in milliseconds.
    pub elapsed_ms: u64,
}

impl AttemptResult {
    /// Records a successful attempt.
    #[must_use]
    pub fn succeeded(elapsed: Duration) -> Self {
        Self {
            success: true,
            failure: None,
            remediation: None,
            elapsed_ms: duration_ms(elapsed),
        }
    }

    /// Records a failed attempt.
    #[must_use]
    pub fn failed(failure: StageFailure, elapsed: Duration) -> Self {
        Self {
            success: false,
            failure: Some(failure),
            remediation: None,
            elapsed_ms: duration_ms(elapsed),
        }
    }

    /// Attaches the remediation outcome that followed this attempt.
    #[must_use]
    pub fn with_remediation(mut self, outcome: RemediationOutcome) -> Self {
        self.remediation = Some(outcome);
        self
    }

    /// Diagnostic text for user display.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match &self.failure {
            Some(failure) => failure.to_string(),
            None => "ok".to_string(),
        }
    }
}

/// Aggregate outcome of one stage across all its attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    /// Stage name.
    pub stage: String,
    /// Terminal status.
    pub status: StageStatus,
    /// Every attempt made, in order. Empty for skipped stages.
    pub attempts: Vec<AttemptResult>,
    /// Total stage duration in milliseconds.
    pub elapsed_ms: u64,
}

impl StageOutcome {
    /// Records a stage that never ran.
    #[must_use]
    pub fn skipped(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            status: StageStatus::Skipped,
            attempts: Vec::new(),
            elapsed_ms: 0,
        }
    }

    /// The failure from the last attempt, if the stage failed.
    #[must_use]
    pub fn terminal_failure(&self) -> Option<&StageFailure> {
        if self.status != StageStatus::Failed {
            return None;
        }
        self.attempts.last().and_then(|a| a.failure.as_ref())
    }

    /// All failures across attempts, for aggregated diagnostics.
    #[must_use]
    pub fn all_failures(&self) -> Vec<&StageFailure> {
        self.attempts.iter().filter_map(|a| a.failure.as_ref()).collect()
    }
}

/// Aggregate record of one full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Overall run status.
    pub status: RunStatus,
    /// Per-stage outcomes, in pipeline order.
    pub stages: Vec<StageOutcome>,
    /// Total run duration in milliseconds.
    pub total_elapsed_ms: u64,
}

impl BuildReport {
    /// Creates a report for a run starting now.
    #[must_use]
    pub fn begin() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            status: RunStatus::Succeeded,
            stages: Vec::new(),
            total_elapsed_ms: 0,
        }
    }

    /// Appends a stage outcome.
    pub fn record(&mut self, outcome: StageOutcome) {
        self.stages.push(outcome);
    }

    /// Finalizes the report with the overall status and elapsed time.
    #[must_use]
    pub fn finalize(mut self, status: RunStatus, total_elapsed: Duration) -> Self {
        self.status = status;
        self.total_elapsed_ms = duration_ms(total_elapsed);
        self
    }

    /// Returns true if every stage succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// The outcome of the first terminally failed stage, if any.
    #[must_use]
    pub fn first_failure(&self) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.status == StageStatus::Failed)
    }

    /// Serializes the report to pretty JSON.
    pub fn to_json(&self) -> Result<String, ForgeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the report as JSON for post-mortem inspection.
    pub fn write_json(&self, path: &Path) -> Result<(), ForgeError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Ok.to_string(), "ok");
        assert_eq!(StageStatus::Skipped.to_string(), "skipped");
        assert_eq!(StageStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_attempt_result_diagnostic() {
        let ok = AttemptResult::succeeded(Duration::from_millis(10));
        assert_eq!(ok.diagnostic(), "ok");

        let failed = AttemptResult::failed(
            StageFailure::retryable(FailureKind::LockContention, "wim still mounted"),
            Duration::from_millis(10),
        );
        assert!(failed.diagnostic().contains("lock contention"));
    }

    #[test]
    fn test_stage_outcome_terminal_failure() {
        let mut outcome = StageOutcome {
            stage: "capture".to_string(),
            status: StageStatus::Failed,
            attempts: vec![
                AttemptResult::failed(
                    StageFailure::retryable(FailureKind::Unknown, "first"),
                    Duration::from_millis(1),
                ),
                AttemptResult::failed(
                    StageFailure::retryable(FailureKind::Unknown, "second"),
                    Duration::from_millis(1),
                ),
            ],
            elapsed_ms: 2,
        };

        assert_eq!(outcome.terminal_failure().unwrap().detail, "second");
        assert_eq!(outcome.all_failures().len(), 2);

        outcome.status = StageStatus::Ok;
        assert!(outcome.terminal_failure().is_none());
    }

    #[test]
    fn test_report_finalize() {
        let mut report = BuildReport::begin();
        report.record(StageOutcome::skipped("apply-updates"));

        let report = report.finalize(RunStatus::Failed, Duration::from_secs(3));
        assert!(!report.success());
        assert_eq!(report.total_elapsed_ms, 3000);
        assert_eq!(report.stages.len(), 1);
    }

    #[test]
    fn test_report_json_roundtrip() {
        let mut report = BuildReport::begin();
        report.record(StageOutcome {
            stage: "create-vm".to_string(),
            status: StageStatus::Ok,
            attempts: vec![AttemptResult::succeeded(Duration::from_millis(42))],
            elapsed_ms: 42,
        });
        let report = report.finalize(RunStatus::Succeeded, Duration::from_millis(42));

        let json = report.to_json().unwrap();
        let back: BuildReport = serde_json::from_str(&json).unwrap();

        assert_eq!(back.run_id, report.run_id);
        assert_eq!(back.status, RunStatus::Succeeded);
        assert_eq!(back.stages[0].stage, "create-vm");
    }

    #[test]
    fn test_report_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let report = BuildReport::begin().finalize(RunStatus::Succeeded, Duration::ZERO);
        report.write_json(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("succeeded"));
    }
}
