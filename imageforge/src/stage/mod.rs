//! Stage trait and remediation types.
//!
//! A stage is one fallible, retryable unit of work in the build pipeline
//! (create WinPE media, apply an update package, connect a capture share).
//! Stages own their retry policy and their between-attempt remediation.

mod command;

pub use command::{classify_output, kind_is_retryable, CommandLine, CommandStage, Probe};

use crate::errors::{FailureKind, FailurePhase, StageFailure};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use uuid::Uuid;

/// Per-attempt execution context handed to stage callbacks.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// The run this attempt belongs to.
    pub run_id: Uuid,
    /// Name of the executing stage.
    pub stage: String,
    /// Attempt number, 0-indexed.
    pub attempt: usize,
}

impl StageContext {
    /// Creates a context for one attempt.
    #[must_use]
    pub fn new(run_id: Uuid, stage: impl Into<String>, attempt: usize) -> Self {
        Self {
            run_id,
            stage: stage.into(),
            attempt,
        }
    }

    /// Returns true if this is the first attempt.
    #[must_use]
    pub fn is_first_attempt(&self) -> bool {
        self.attempt == 0
    }
}

/// Result of a best-effort remediation pass.
///
/// Remediation never fails as such: anything it could not fix is reported
/// as a residual issue and the retry proceeds regardless.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationOutcome {
    /// Corrective steps actually taken.
    pub applied: Vec<String>,
    /// Conditions the remediation observed but could not resolve.
    pub residual: Vec<String>,
}

impl RemediationOutcome {
    /// A no-op outcome: nothing was wrong, nothing was done.
    #[must_use]
    pub fn noop() -> Self {
        Self::default()
    }

    /// Records a step that was taken.
    #[must_use]
    pub fn with_applied(mut self, step: impl Into<String>) -> Self {
        self.applied.push(step.into());
        self
    }

    /// Records an unresolved condition.
    #[must_use]
    pub fn with_residual(mut self, issue: impl Into<String>) -> Self {
        self.residual.push(issue.into());
        self
    }

    /// Returns true if nothing was left unresolved.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.residual.is_empty()
    }

    /// Collapses residual issues into a classified remediation failure.
    ///
    /// Remediation failures are swallowed, never propagated as the
    /// stage's error; this is how they surface in the run log.
    #[must_use]
    pub fn as_failure(&self) -> Option<StageFailure> {
        if self.residual.is_empty() {
            return None;
        }
        Some(
            StageFailure::retryable(FailureKind::Unknown, self.residual.join("; "))
                .with_phase(FailurePhase::Remediation),
        )
    }
}

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Returns the retry policy governing this stage.
    fn policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Pre-flight check run once before the first attempt.
    ///
    /// A failure here bypasses retry: the stage fails terminally without
    /// its action ever running, and the pipeline halts.
    async fn precondition(&self, _ctx: &StageContext) -> Result<(), StageFailure> {
        Ok(())
    }

    /// Executes the stage's main action.
    async fn action(&self, ctx: &StageContext) -> Result<(), StageFailure>;

    /// Best-effort cleanup run strictly between a failed attempt and the
    /// next retry. Must be idempotent and must not error; unresolved
    /// conditions go into the outcome's residual list.
    async fn remediate(&self, _ctx: &StageContext) -> RemediationOutcome {
        RemediationOutcome::noop()
    }
}

/// A closure-backed stage, for simple pipelines and tests.
pub struct FnStage<F>
where
    F: Fn(&StageContext) -> Result<(), StageFailure> + Send + Sync,
{
    name: String,
    policy: RetryPolicy,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext) -> Result<(), StageFailure> + Send + Sync,
{
    /// Creates a new closure-backed stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            policy: RetryPolicy::default(),
            func,
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext) -> Result<(), StageFailure> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&StageContext) -> Result<(), StageFailure> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self) -> RetryPolicy {
        self.policy.clone()
    }

    async fn action(&self, ctx: &StageContext) -> Result<(), StageFailure> {
        (self.func)(ctx)
    }
}
