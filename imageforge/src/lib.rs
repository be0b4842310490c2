//! # Imageforge
//!
//! Build orchestration core for deployment-image pipelines.
//!
//! Imageforge sequences a pipeline of fallible, expensive, external
//! operations (media creation, package servicing, image capture) with:
//!
//! - **Pre-flight validation**: probes checked before a stage's first attempt
//! - **Bounded retries**: per-stage attempt budgets with backoff and jitter
//! - **Between-attempt remediation**: best-effort, idempotent cleanup that
//!   never gates the retry
//! - **Actionable diagnostics**: terminal failures classified into a closed
//!   root-cause taxonomy with canned guidance
//! - **Cooperative cancellation**: backoff waits are interruptible and the
//!   run report distinguishes cancelled from failed
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use imageforge::prelude::*;
//!
//! let config = BuildConfig::load(Path::new("build.toml"))?;
//! let executor = PipelineExecutor::new();
//! let report = executor.run(&config.into_stages()).await?;
//! println!("{}", diagnose::explain(&report));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod diagnose;
pub mod errors;
pub mod executor;
pub mod fanout;
pub mod process;
pub mod report;
pub mod retry;
pub mod stage;
pub mod testing;


/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{BuildConfig, StageConfig};
    pub use crate::diagnose::{explain, guidance};
    pub use crate::errors::{FailureKind, FailurePhase, ForgeError, StageFailure};
    pub use crate::executor::PipelineExecutor;
    pub use crate::fanout::{FanOut, WorkerResult};
    pub use crate::process::{run_command, CommandOutput, ProcessError};
    pub use crate::report::{
        AttemptResult, BuildReport, RunStatus, StageOutcome, StageStatus,
    };
    pub use crate::retry::{BackoffStrategy, JitterStrategy, RetryPolicy};
    pub use crate::stage::{
        CommandLine, CommandStage, FnStage, Probe, RemediationOutcome, Stage,
        StageContext,
    };
}
