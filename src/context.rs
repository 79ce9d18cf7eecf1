//! Cancellation and deadlines for client calls.
//!
//! Every client operation takes a [`Context`]. In-flight requests race
//! against the context and fail with [`AlertmanagerError::Cancelled`] or
//! [`AlertmanagerError::DeadlineExceeded`] as soon as either fires.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::errors::{AlertmanagerError, Result};

/// Cancellation token and optional deadline threaded through every call
///
/// Contexts are cheap to clone; clones share the cancellation signal.
///
/// # Example
///
/// ```rust
/// use alert_manager_kit::Context;
/// use std::time::Duration;
///
/// let (ctx, handle) = Context::with_timeout(Duration::from_secs(10)).with_cancel();
/// assert!(!ctx.is_cancelled());
/// handle.cancel();
/// assert!(ctx.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels the [`Context`] it was created with, and all clones of it
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel the context and every clone of it
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Context {
    /// Context that never expires and cannot be cancelled
    pub fn background() -> Self {
        Self::default()
    }

    /// Context expiring `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Context expiring at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: None,
        }
    }

    /// Derive a context that keeps this one's cancellation and expires after
    /// `timeout` or at this context's deadline, whichever comes first
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
            cancel: self.cancel.clone(),
        }
    }

    /// Attach a fresh cancellation signal, replacing any inherited one
    pub fn with_cancel(self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                deadline: self.deadline,
                cancel: Some(rx),
            },
            CancelHandle { tx },
        )
    }

    /// Deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the cancel handle has fired
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail fast if the context is already done
    pub(crate) fn check(&self, operation: &'static str) -> Result<()> {
        if self.is_cancelled() {
            return Err(AlertmanagerError::Cancelled { operation });
        }
        if self.is_expired() {
            return Err(AlertmanagerError::DeadlineExceeded { operation });
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context is cancelled or expires first
    pub(crate) async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check(operation)?;

        tokio::select! {
            result = fut => result,
            () = self.cancelled() => Err(AlertmanagerError::Cancelled { operation }),
            () = self.expired() => Err(AlertmanagerError::DeadlineExceeded { operation }),
        }
    }

    async fn cancelled(&self) {
        if let Some(rx) = &self.cancel {
            let mut rx = rx.clone();
            let cancelled = rx.wait_for(|cancelled| *cancelled).await.is_ok();
            if cancelled {
                return;
            }
        }
        // Never cancellable, or the handle was dropped without cancelling.
        std::future::pending::<()>().await;
    }

    async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_runs_to_completion() {
        let ctx = Context::background();
        let value = ctx.run("op", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_deadline_interrupts_slow_future() {
        let ctx = Context::with_timeout(Duration::from_millis(20));
        let result: Result<()> = ctx
            .run("slow", async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        assert!(matches!(
            result,
            Err(AlertmanagerError::DeadlineExceeded { operation: "slow" })
        ));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_future() {
        let (ctx, handle) = Context::background().with_cancel();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let result: Result<()> = ctx
            .run("pending", std::future::pending::<Result<()>>())
            .await;
        assert!(matches!(
            result,
            Err(AlertmanagerError::Cancelled { operation: "pending" })
        ));
        canceller.await.unwrap();
    }

    #[tokio::test]
    #[allow(unreachable_code)]
    async fn test_already_cancelled_skips_future() {
        let (ctx, handle) = Context::background().with_cancel();
        handle.cancel();

        let result: Result<()> = ctx
            .run("never", async {
                panic!("future must not be polled");
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AlertmanagerError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_cancel() {
        let (ctx, handle) = Context::background().with_cancel();
        drop(handle);
        assert!(!ctx.is_cancelled());
        let value = ctx.run("op", async { Ok("done") }).await.unwrap();
        assert_eq!(value, "done");
    }

    #[test]
    fn test_child_keeps_earlier_deadline() {
        let parent = Context::with_timeout(Duration::from_millis(10));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        let (parent, handle) = Context::background().with_cancel();
        let child = parent.child_with_timeout(Duration::from_secs(60));
        handle.cancel();
        assert!(child.is_cancelled());
    }
}
