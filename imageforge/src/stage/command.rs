//! A stage that drives an external command.
//!
//! `CommandStage` is how config-defined pipelines execute real work: a
//! pre-flight probe list, the main command, and an optional remediation
//! command run between failed attempts. Tool output is classified into the
//! failure taxonomy by scanning stderr for well-known phrases.

use super::{RemediationOutcome, Stage, StageContext};
use crate::errors::{FailureKind, StageFailure};
use crate::process::{run_command, CommandOutput, ProcessError};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A pre-flight probe evaluated before a stage's first attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Probe {
    /// A tool must resolve on `PATH`.
    ToolOnPath {
        /// Tool executable name.
        tool: String,
    },
    /// A path must exist.
    PathExists {
        /// The required path.
        path: PathBuf,
    },
    /// A volume must have at least this much free space.
    MinFreeSpace {
        /// Any path on the volume to check.
        path: PathBuf,
        /// Required free bytes.
        bytes: u64,
    },
}

impl Probe {
    /// Evaluates the probe. Failures are fatal precondition failures:
    /// retrying cannot install a missing tool or grow a disk.
    pub fn evaluate(&self) -> Result<(), StageFailure> {
        match self {
            Self::ToolOnPath { tool } => match which::which(tool) {
                Ok(_) => Ok(()),
                Err(e) => Err(StageFailure::precondition(
                    FailureKind::DependencyUnavailable,
                    format!("required tool '{tool}' not found on PATH: {e}"),
                )),
            },
            Self::PathExists { path } => {
                if path.exists() {
                    Ok(())
                } else {
                    Err(StageFailure::precondition(
                        FailureKind::DependencyUnavailable,
                        format!("required path '{}' does not exist", path.display()),
                    ))
                }
            }
            Self::MinFreeSpace { path, bytes } => {
                let free = fs2::available_space(path).map_err(|e| {
                    StageFailure::precondition(
                        FailureKind::DependencyUnavailable,
                        format!("cannot query free space on '{}': {e}", path.display()),
                    )
                })?;
                if free >= *bytes {
                    Ok(())
                } else {
                    Err(StageFailure::precondition(
                        FailureKind::ResourceExhausted,
                        format!(
                            "'{}' has {free} bytes free, {bytes} required",
                            path.display()
                        ),
                    ))
                }
            }
        }
    }
}

/// One command line: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    /// Program to run.
    pub program: String,
    /// Arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Classifies tool output into the failure taxonomy by scanning stderr
/// (falling back to stdout) for well-known phrases.
#[must_use]
pub fn classify_output(output: &CommandOutput) -> FailureKind {
    let text = if output.stderr.trim().is_empty() {
        output.stdout.to_lowercase()
    } else {
        output.stderr.to_lowercase()
    };

    const LOCK_PHRASES: &[&str] = &["in use", "being used by another process", "locked", "sharing violation"];
    const SPACE_PHRASES: &[&str] = &["not enough space", "disk full", "no space left", "insufficient storage"];
    const PERMISSION_PHRASES: &[&str] = &["access is denied", "permission denied", "requires elevation"];
    const DEPENDENCY_PHRASES: &[&str] = &["not recognized", "command not found", "service is not running", "no such file"];

    if SPACE_PHRASES.iter().any(|p| text.contains(p)) {
        FailureKind::ResourceExhausted
    } else if LOCK_PHRASES.iter().any(|p| text.contains(p)) {
        FailureKind::LockContention
    } else if PERMISSION_PHRASES.iter().any(|p| text.contains(p)) {
        FailureKind::PermissionDenied
    } else if DEPENDENCY_PHRASES.iter().any(|p| text.contains(p)) {
        FailureKind::DependencyUnavailable
    } else {
        FailureKind::Unknown
    }
}

/// Returns true if a failure of this kind is worth retrying. Missing
/// tools, missing space, and denied access do not fix themselves between
/// attempts; stale locks and unclassified flakes sometimes do.
#[must_use]
pub fn kind_is_retryable(kind: FailureKind) -> bool {
    matches!(kind, FailureKind::LockContention | FailureKind::Unknown)
}

/// A pipeline stage backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandStage {
    name: String,
    command: CommandLine,
    policy: RetryPolicy,
    probes: Vec<Probe>,
    remediation: Option<CommandLine>,
}

impl CommandStage {
    /// Creates a command stage with the default retry policy.
    #[must_use]
    pub fn new(name: impl Into<String>, command: CommandLine) -> Self {
        Self {
            name: name.into(),
            command,
            policy: RetryPolicy::default(),
            probes: Vec::new(),
            remediation: None,
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Adds a pre-flight probe.
    #[must_use]
    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probes.push(probe);
        self
    }

    /// Sets the remediation command run between failed attempts.
    ///
    /// The command must be safe to run when nothing is wrong; it is
    /// invoked on every failed attempt with retries remaining.
    #[must_use]
    pub fn with_remediation(mut self, command: CommandLine) -> Self {
        self.remediation = Some(command);
        self
    }
}

#[async_trait]
impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self) -> RetryPolicy {
        self.policy.clone()
    }

    async fn precondition(&self, _ctx: &StageContext) -> Result<(), StageFailure> {
        for probe in &self.probes {
            probe.evaluate()?;
        }
        Ok(())
    }

    async fn action(&self, _ctx: &StageContext) -> Result<(), StageFailure> {
        // The executor bounds the attempt; no inner timeout here.
        let output = run_command(&self.command.program, &self.command.args, None)
            .await
            .map_err(|e| match e {
                ProcessError::Spawn { .. } => {
                    StageFailure::fatal(FailureKind::DependencyUnavailable, e.to_string())
                }
                ProcessError::TimedOut { .. } => {
                    StageFailure::retryable(FailureKind::Unknown, e.to_string())
                }
            })?;

        if output.success() {
            return Ok(());
        }

        let kind = classify_output(&output);
        let failure = StageFailure::retryable(kind, output.diagnostic());
        if kind_is_retryable(kind) {
            Err(failure)
        } else {
            Err(StageFailure { fatal: true, ..failure })
        }
    }

    async fn remediate(&self, _ctx: &StageContext) -> RemediationOutcome {
        let Some(command) = &self.remediation else {
            return RemediationOutcome::noop();
        };

        match run_command(&command.program, &command.args, None).await {
            Ok(output) if output.success() => {
                RemediationOutcome::noop().with_applied(format!("ran '{}'", command.program))
            }
            Ok(output) => RemediationOutcome::noop().with_residual(format!(
                "remediation '{}' failed: {}",
                command.program,
                output.diagnostic()
            )),
            Err(e) => RemediationOutcome::noop()
                .with_residual(format!("remediation '{}' did not run: {e}", command.program)),
        }
    }
}
