//! Terminal-failure diagnostics.
//!
//! Turns a finished [`BuildReport`] into actionable text: the likely root
//! cause category and its canned guidance, never a raw unclassified error
//! dump. Pure functions, deterministic for a given report.

use crate::errors::FailureKind;
use crate::report::{BuildReport, RunStatus, StageOutcome};
use std::fmt::Write as _;

/// Canned guidance for a failure category.
#[must_use]
pub fn guidance(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::ResourceExhausted => {
            "Free disk space on the scratch and output volumes, then rerun. \
             Image capture needs headroom of at least twice the image size."
        }
        FailureKind::LockContention => {
            "Another process is holding a mount or file handle. Close open \
             explorer windows and image tools, dismount stale images, and rerun."
        }
        FailureKind::PermissionDenied => {
            "Run from an elevated prompt and check that antivirus is not \
             quarantining the working directory."
        }
        FailureKind::DependencyUnavailable => {
            "A required tool or service is missing or unhealthy. Verify the \
             deployment toolkit installation and that dependent services are running."
        }
        FailureKind::Unknown => {
            "No known cause matched. Inspect the raw diagnostic text below \
             and the detailed log for the failing tool's output."
        }
    }
}

/// Explains a finished report in human-readable form.
///
/// Deterministic given the same report; performs no I/O.
#[must_use]
pub fn explain(report: &BuildReport) -> String {
    let mut out = String::new();

    match report.status {
        RunStatus::Succeeded => {
            let _ = writeln!(
                out,
                "build {} succeeded: {} stage(s) in {}ms",
                report.run_id,
                report.stages.len(),
                report.total_elapsed_ms
            );
            return out;
        }
        RunStatus::Cancelled => {
            let _ = writeln!(out, "build {} was cancelled before completion", report.run_id);
        }
        RunStatus::Failed => {
            let _ = writeln!(out, "build {} failed", report.run_id);
        }
    }

    for outcome in &report.stages {
        if let Some(failure) = outcome.terminal_failure() {
            let _ = writeln!(
                out,
                "\nstage '{}' failed after {} attempt(s)",
                outcome.stage,
                outcome.attempts.len()
            );
            let _ = writeln!(out, "  likely cause: {}", failure.kind);
            let _ = writeln!(out, "  guidance: {}", guidance(failure.kind));
            write_attempt_history(&mut out, outcome);
        }
    }

    let skipped: Vec<&str> = report
        .stages
        .iter()
        .filter(|s| s.status == crate::report::StageStatus::Skipped)
        .map(|s| s.stage.as_str())
        .collect();
    if !skipped.is_empty() {
        let _ = writeln!(out, "\nnot attempted: {}", skipped.join(", "));
    }

    let _ = writeln!(out, "\nsee the run log for full tool output");
    out
}

fn write_attempt_history(out: &mut String, outcome: &StageOutcome) {
    for (index, attempt) in outcome.attempts.iter().enumerate() {
        let _ = writeln!(out, "  attempt {}: {}", index + 1, attempt.diagnostic());
        if let Some(remediation) = &attempt.remediation {
            for step in &remediation.applied {
                let _ = writeln!(out, "    remediated: {step}");
            }
            for issue in &remediation.residual {
                let _ = writeln!(out, "    unresolved: {issue}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StageFailure;
    use crate::report::{AttemptResult, StageStatus};
    use crate::stage::RemediationOutcome;
    use std::time::Duration;

    fn failed_report() -> BuildReport {
        let mut report = BuildReport::begin();
        report.record(StageOutcome {
            stage: "create-media".to_string(),
            status: StageStatus::Ok,
            attempts: vec![AttemptResult::succeeded(Duration::from_millis(5))],
            elapsed_ms: 5,
        });
        report.record(StageOutcome {
            stage: "connect-share".to_string(),
            status: StageStatus::Failed,
            attempts: vec![
                AttemptResult::failed(
                    StageFailure::retryable(FailureKind::LockContention, "share handle busy"),
                    Duration::from_millis(5),
                )
                .with_remediation(RemediationOutcome::noop().with_applied("reset share session")),
                AttemptResult::failed(
                    StageFailure::retryable(FailureKind::LockContention, "share handle busy"),
                    Duration::from_millis(5),
                ),
            ],
            elapsed_ms: 10,
        });
        report.record(StageOutcome::skipped("capture"));
        report.finalize(RunStatus::Failed, Duration::from_millis(15))
    }

    #[test]
    fn test_explain_is_deterministic() {
        let report = failed_report();
        assert_eq!(explain(&report), explain(&report));
    }

    #[test]
    fn test_explain_classifies_and_guides() {
        let text = explain(&failed_report());

        assert!(text.contains("failed"));
        assert!(text.contains("likely cause: lock contention"));
        assert!(text.contains("dismount stale images"));
        assert!(text.contains("attempt 1"));
        assert!(text.contains("remediated: reset share session"));
        assert!(text.contains("not attempted: capture"));
    }

    #[test]
    fn test_explain_success() {
        let report = BuildReport::begin().finalize(RunStatus::Succeeded, Duration::from_millis(1));
        let text = explain(&report);
        assert!(text.contains("succeeded"));
    }

    #[test]
    fn test_explain_cancelled_distinct_from_failed() {
        let report = BuildReport::begin().finalize(RunStatus::Cancelled, Duration::ZERO);
        let text = explain(&report);
        assert!(text.contains("cancelled"));
        assert!(!text.contains("failed"));
    }

    #[test]
    fn test_guidance_covers_taxonomy() {
        for kind in [
            FailureKind::ResourceExhausted,
            FailureKind::LockContention,
            FailureKind::PermissionDenied,
            FailureKind::DependencyUnavailable,
            FailureKind::Unknown,
        ] {
            assert!(!guidance(kind).is_empty());
        }
    }
}
