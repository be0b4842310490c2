//! Test fixtures for exercising pipelines without real external tools.

use crate::errors::{FailureKind, StageFailure};
use crate::retry::RetryPolicy;
use crate::stage::{RemediationOutcome, Stage, StageContext};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared call counters for a [`ScriptedStage`].
#[derive(Debug, Default)]
pub struct StageCounters {
    /// Number of precondition evaluations.
    pub preconditions: AtomicUsize,
    /// Number of action attempts.
    pub actions: AtomicUsize,
    /// Number of remediation passes.
    pub remediations: AtomicUsize,
}

impl StageCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// A stage whose behavior is scripted per attempt.
///
/// Fails its action for the first `fail_times` attempts, then succeeds.
/// Counts every callback invocation so tests can assert on executor
/// sequencing.
#[derive(Debug)]
pub struct ScriptedStage {
    name: String,
    policy: RetryPolicy,
    fail_times: usize,
    fatal: bool,
    precondition_failure: Option<StageFailure>,
    remediation_residual: Option<String>,
    counters: Arc<StageCounters>,
}

impl ScriptedStage {
    /// Creates a stage that always succeeds.
    #[must_use]
    pub fn succeeding(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: RetryPolicy::once().with_base_delay_ms(1),
            fail_times: 0,
            fatal: false,
            precondition_failure: None,
            remediation_residual: None,
            counters: StageCounters::new(),
        }
    }

    /// Fails the action for the first `n` attempts, then succeeds.
    #[must_use]
    pub fn failing_times(mut self, n: usize) -> Self {
        self.fail_times = n;
        self
    }

    /// Makes every action failure fatal.
    #[must_use]
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    /// Makes the precondition fail with the given failure.
    #[must_use]
    pub fn with_precondition_failure(mut self, failure: StageFailure) -> Self {
        self.precondition_failure = Some(failure);
        self
    }

    /// Makes every remediation pass report a residual issue.
    #[must_use]
    pub fn with_remediation_residual(mut self, issue: impl Into<String>) -> Self {
        self.remediation_residual = Some(issue.into());
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns a handle to the invocation counters.
    #[must_use]
    pub fn counters(&self) -> Arc<StageCounters> {
        self.counters.clone()
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self) -> RetryPolicy {
        self.policy.clone()
    }

    async fn precondition(&self, _ctx: &StageContext) -> Result<(), StageFailure> {
        self.counters.preconditions.fetch_add(1, Ordering::SeqCst);
        match &self.precondition_failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    async fn action(&self, _ctx: &StageContext) -> Result<(), StageFailure> {
        let attempt = self.counters.actions.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_times {
            let failure = StageFailure::retryable(
                FailureKind::Unknown,
                format!("scripted failure on attempt {attempt}"),
            );
            if self.fatal {
                return Err(StageFailure { fatal: true, ..failure });
            }
            return Err(failure);
        }
        Ok(())
    }

    async fn remediate(&self, _ctx: &StageContext) -> RemediationOutcome {
        self.counters.remediations.fetch_add(1, Ordering::SeqCst);
        match &self.remediation_residual {
            Some(issue) => RemediationOutcome::noop().with_residual(issue.clone()),
            None => RemediationOutcome::noop().with_applied("cleared scratch state"),
        }
    }
}

/// A stage whose action never completes, for cancellation tests.
#[derive(Debug)]
pub struct HangingStage {
    name: String,
}

impl HangingStage {
    /// Creates a new hanging stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for HangingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn action(&self, _ctx: &StageContext) -> Result<(), StageFailure> {
        std::future::pending::<()>().await;
        Ok(())
    }
}
