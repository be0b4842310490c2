//! Fan-out/fan-in batch execution.
//!
//! For batch side work on disjoint resources (formatting several target
//! drives, copying media to multiple destinations): launch N independent
//! workers, wait for all of them at an explicit join barrier, and
//! aggregate per-worker results. Workers share no mutable state, so a
//! failure in one never interrupts the others.

use crate::cancellation::CancellationToken;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Result of one worker in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerResult {
    /// Worker name, for reporting.
    pub worker: String,
    /// The worker's outcome; `Err` carries its diagnostic text.
    pub result: Result<(), String>,
}

/// A batch of independent workers with an explicit join barrier.
pub struct FanOut {
    token: Arc<CancellationToken>,
    handles: Mutex<Vec<(String, JoinHandle<Result<(), String>>)>>,
}

impl FanOut {
    /// Creates an empty batch with a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::with_token(Arc::new(CancellationToken::new()))
    }

    /// Creates an empty batch driven by an externally owned token.
    #[must_use]
    pub fn with_token(token: Arc<CancellationToken>) -> Self {
        Self {
            token,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Returns the batch's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> Arc<CancellationToken> {
        self.token.clone()
    }

    /// Spawns a worker. The worker receives the shared token and should
    /// check it at its own safe points.
    pub fn spawn<F, Fut>(&self, name: impl Into<String>, worker: F)
    where
        F: FnOnce(Arc<CancellationToken>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let token = self.token.clone();
        let handle = tokio::spawn(worker(token));
        self.handles.lock().push((name.into(), handle));
    }

    /// Returns the number of spawned workers not yet joined.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// The join barrier: waits for every worker and aggregates results.
    ///
    /// A worker failure never interrupts the rest of the batch; panicked
    /// workers are folded into the results as failures.
    pub async fn join(&self) -> Vec<WorkerResult> {
        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());
        let mut results = Vec::with_capacity(handles.len());

        for (worker, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_error) => {
                    warn!(%worker, %join_error, "worker did not finish cleanly");
                    Err(format!("worker did not finish cleanly: {join_error}"))
                }
            };
            results.push(WorkerResult { worker, result });
        }

        results
    }
}

impl Default for FanOut {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FanOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOut")
            .field("worker_count", &self.worker_count())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
