//! External process invocation.
//!
//! The build core shells out for everything expensive (media creation,
//! package servicing, image capture). This module runs one command,
//! captures stdout/stderr/exit code, and bounds the wait for exit.

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Captured output of one external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns true if the command exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// A short diagnostic line combining exit code and stderr.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        let code = self
            .exit_code
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit code {code}")
        } else {
            format!("exit code {code}: {stderr}")
        }
    }
}

/// Errors from the process facility itself (not from the tool's own
/// nonzero exits, which are reported through [`CommandOutput`]).
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The process did not exit within the bounded wait.
    #[error("'{program}' did not exit within {}ms", limit.as_millis())]
    TimedOut {
        /// The program that overran.
        program: String,
        /// The wait bound.
        limit: Duration,
    },
}

/// Runs a command to completion and captures its output.
///
/// When `limit` is set the wait is bounded; an overrunning process is
/// killed and reported as [`ProcessError::TimedOut`].
pub async fn run_command(
    program: &str,
    args: &[String],
    limit: Option<Duration>,
) -> Result<CommandOutput, ProcessError> {
    debug!(%program, ?args, "running external command");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let waited = match limit {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| ProcessError::TimedOut {
                program: program.to_string(),
                limit,
            })?,
        None => child.wait_with_output().await,
    };

    let output = waited.map_err(|source| ProcessError::Spawn {
        program: program.to_string(),
        source,
    })?;

    Ok(CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
