//! The pipeline executor.
//!
//! Runs an ordered list of stages sequentially, enforcing each stage's
//! retry policy: check the precondition, attempt the action, on failure run
//! best-effort remediation, wait out the backoff, retry until the attempt
//! budget is exhausted or the failure is fatal. The first terminal stage
//! failure stops the pipeline; later stages are recorded as skipped, never
//! attempted.

use crate::cancellation::CancellationToken;
use crate::errors::{FailureKind, ForgeError, StageFailure};
use crate::report::{AttemptResult, BuildReport, RunStatus, StageOutcome, StageStatus};
use crate::stage::{Stage, StageContext};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Sequential pipeline executor with per-stage recovery policies.
///
/// The executor holds no external resources of its own; all side effects
/// belong to the stages it drives.
#[derive(Debug)]
pub struct PipelineExecutor {
    token: Arc<CancellationToken>,
}

impl PipelineExecutor {
    /// Creates an executor with a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: Arc::new(CancellationToken::new()),
        }
    }

    /// Creates an executor driven by an externally owned token.
    #[must_use]
    pub fn with_token(token: Arc<CancellationToken>) -> Self {
        Self { token }
    }

    /// Returns a handle to the cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> Arc<CancellationToken> {
        self.token.clone()
    }

    /// Runs the pipeline to completion, terminal failure, or cancellation.
    ///
    /// Returns `Err` only for an invalid pipeline definition; run outcomes,
    /// including cancellation, are expressed through the report.
    pub async fn run(&self, stages: &[Box<dyn Stage>]) -> Result<BuildReport, ForgeError> {
        if stages.is_empty() {
            return Err(ForgeError::InvalidPipeline("no stages defined".to_string()));
        }
        for stage in stages {
            if stage.policy().max_attempts == 0 {
                return Err(ForgeError::InvalidPipeline(format!(
                    "stage '{}' has a zero attempt budget",
                    stage.name()
                )));
            }
        }

        let mut report = BuildReport::begin();
        let run_id = report.run_id;
        info!(%run_id, stages = stages.len(), "starting build run");

        let mut run_status = RunStatus::Succeeded;
        let mut halted_at = None;

        for (index, stage) in stages.iter().enumerate() {
            if self.token.is_cancelled() {
                run_status = RunStatus::Cancelled;
                halted_at = Some(index);
                break;
            }

            let outcome = self.run_stage(run_id, stage.as_ref()).await;
            let status = outcome.status;
            report.record(outcome);

            match status {
                StageStatus::Ok => {}
                StageStatus::Failed => {
                    error!(stage = stage.name(), "stage failed terminally, halting pipeline");
                    run_status = RunStatus::Failed;
                    halted_at = Some(index + 1);
                    break;
                }
                StageStatus::Cancelled => {
                    run_status = RunStatus::Cancelled;
                    halted_at = Some(index + 1);
                    break;
                }
                // run_stage never yields skipped
                StageStatus::Skipped => {}
            }
        }

        if let Some(from) = halted_at {
            for stage in &stages[from..] {
                report.record(StageOutcome::skipped(stage.name()));
            }
        }

        // Total time is the sum of per-stage times so the aggregate is
        // deterministic with respect to the outcomes it contains.
        let total_ms: u64 = report.stages.iter().map(|s| s.elapsed_ms).sum();
        let report = report.finalize(run_status, Duration::from_millis(total_ms));
        info!(%run_id, status = %report.status, "build run finished");
        Ok(report)
    }

    async fn run_stage(&self, run_id: Uuid, stage: &dyn Stage) -> StageOutcome {
        let policy = stage.policy();
        let stage_start = Instant::now();
        let mut attempts = Vec::new();

        info!(stage = stage.name(), max_attempts = policy.max_attempts, "stage starting");

        // Pre-flight check, once, before the first attempt.
        let pre_ctx = StageContext::new(run_id, stage.name(), 0);
        let pre_start = Instant::now();
        if let Err(failure) = stage.precondition(&pre_ctx).await {
            error!(stage = stage.name(), %failure, "pre-flight check failed");
            attempts.push(AttemptResult::failed(failure, pre_start.elapsed()));
            return StageOutcome {
                stage: stage.name().to_string(),
                status: StageStatus::Failed,
                attempts,
                elapsed_ms: elapsed_ms(stage_start),
            };
        }

        let mut attempt = 0;
        loop {
            let ctx = StageContext::new(run_id, stage.name(), attempt);
            let attempt_start = Instant::now();
            let result = self.attempt_action(stage, &ctx, &policy).await;
            let elapsed = attempt_start.elapsed();

            match result {
                Ok(()) => {
                    attempts.push(AttemptResult::succeeded(elapsed));
                    info!(stage = stage.name(), attempt, "stage succeeded");
                    return StageOutcome {
                        stage: stage.name().to_string(),
                        status: StageStatus::Ok,
                        attempts,
                        elapsed_ms: elapsed_ms(stage_start),
                    };
                }
                Err(failure) => {
                    let terminal = failure.fatal || attempt + 1 >= policy.max_attempts;
                    warn!(stage = stage.name(), attempt, %failure, terminal, "attempt failed");

                    if terminal {
                        attempts.push(AttemptResult::failed(failure, elapsed));
                        return StageOutcome {
                            stage: stage.name().to_string(),
                            status: StageStatus::Failed,
                            attempts,
                            elapsed_ms: elapsed_ms(stage_start),
                        };
                    }

                    // Remediation runs strictly between a failed attempt
                    // and the next retry, and never gates the retry.
                    let remediation = stage.remediate(&ctx).await;
                    if let Some(swallowed) = remediation.as_failure() {
                        warn!(
                            stage = stage.name(),
                            %swallowed,
                            "remediation left unresolved conditions"
                        );
                    }
                    attempts.push(AttemptResult::failed(failure, elapsed).with_remediation(remediation));

                    let delay = policy.delay_after(attempt);
                    debug!(stage = stage.name(), delay_ms = delay.as_millis() as u64, "backing off before retry");
                    tokio::select! {
                        () = self.token.cancelled() => {
                            info!(stage = stage.name(), "cancelled during backoff");
                            return StageOutcome {
                                stage: stage.name().to_string(),
                                status: StageStatus::Cancelled,
                                attempts,
                                elapsed_ms: elapsed_ms(stage_start),
                            };
                        }
                        () = tokio::time::sleep(delay) => {}
                    }

                    attempt += 1;
                }
            }
        }
    }

    async fn attempt_action(
        &self,
        stage: &dyn Stage,
        ctx: &StageContext,
        policy: &crate::retry::RetryPolicy,
    ) -> Result<(), StageFailure> {
        match policy.attempt_timeout() {
            Some(limit) => match tokio::time::timeout(limit, stage.action(ctx)).await {
                Ok(result) => result,
                Err(_) => Err(StageFailure::retryable(
                    FailureKind::Unknown,
                    format!("action did not finish within {}ms", limit.as_millis()),
                )),
            },
            None => stage.action(ctx).await,
        }
    }
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
