//! Cooperative cancellation for build runs.
//!
//! The executor checks the token between stages and races it against
//! backoff waits, so a cancel lands at the next suspend point rather than
//! tearing down an external tool mid-operation.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A token for cooperative cancellation.
///
/// Cancellation is idempotent; only the first reason is kept.
#[derive(Default)]
pub struct CancellationToken {
    cancelled: AtomicBool,
    reason: RwLock<Option<String>>,
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation with a reason. First reason wins.
    pub fn cancel(&self, reason: impl Into<String>) {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.reason.write() = Some(reason.into());
            self.notify.notify_waiters();
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            let mut notified = std::pin::pin!(self.notify.notified());
            // Register the waiter before re-checking the flag, so a cancel
            // landing between the check and the await still wakes us.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_token_default_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());
    }

    #[test]
    fn test_token_cancel_idempotent() {
        let token = CancellationToken::new();
        token.cancel("operator abort");
        token.cancel("second reason");

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some("operator abort".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel("abort");
        // Must not hang.
        token.cancelled().await;
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let token = Arc::new(CancellationToken::new());
        let waiter = token.clone();

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
            waiter.reason()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel("abort");

        let reason = handle.await.unwrap();
        assert_eq!(reason, Some("abort".to_string()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_survives_racing_cancel() {
        // cancel() is one-shot, so a waiter that misses its single wakeup
        // would pend forever. Race a threaded cancel against the waiter
        // registration repeatedly; every round must complete.
        for _ in 0..200 {
            let token = Arc::new(CancellationToken::new());

            let waiter = {
                let token = token.clone();
                tokio::spawn(async move { token.cancelled().await })
            };
            let canceller = {
                let token = token.clone();
                std::thread::spawn(move || token.cancel("abort"))
            };

            canceller.join().unwrap();
            tokio::time::timeout(Duration::from_secs(5), waiter)
                .await
                .expect("waiter missed the cancel wakeup")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_cancelled_interrupts_sleep_race() {
        let token = Arc::new(CancellationToken::new());
        let racer = token.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                () = racer.cancelled() => "cancelled",
                () = tokio::time::sleep(Duration::from_secs(30)) => "slept",
            }
        });

        token.cancel("abort");
        assert_eq!(handle.await.unwrap(), "cancelled");
    }
}
