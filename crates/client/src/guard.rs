//! Per-operation deadline with guaranteed cancellation.
//!
//! A [`TimeoutGuard`] starts out idle. [`TimeoutGuard::run`] consumes it,
//! runs the operation, and finishes in one of two terminal states reported
//! by [`Guarded`]. Whatever the exit path (completion, expiry, an error
//! value, or a panic unwinding through the guard) the operation's
//! cancellation token is cancelled before control returns, and an expired
//! operation's future is dropped so its late result can never be observed.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Terminal state of a guarded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    /// The operation finished before the deadline.
    Completed(T),
    /// The deadline elapsed first; the operation was cancelled.
    TimedOut,
}

/// Deadline wrapper for one fetch operation.
#[derive(Debug)]
pub struct TimeoutGuard {
    deadline: Duration,
    token: CancellationToken,
}

impl TimeoutGuard {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline, token: CancellationToken::new() }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Handle to the token handed to the operation.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run `op` under the deadline.
    ///
    /// `op` receives the cancellation token so work it hands off elsewhere
    /// can observe cancellation. A zero deadline never starts the operation.
    pub async fn run<F, Fut, T>(self, op: F) -> Guarded<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T>,
    {
        let token = self.token.clone();
        let _cancel_on_exit = self.token.drop_guard();

        if self.deadline.is_zero() {
            tracing::debug!("zero deadline, operation not started");
            return Guarded::TimedOut;
        }

        match tokio::time::timeout(self.deadline, op(token)).await {
            Ok(value) => Guarded::Completed(value),
            Err(_) => {
                tracing::debug!("operation exceeded {}ms deadline", self.deadline.as_millis());
                Guarded::TimedOut
            }
        }
    }
}
