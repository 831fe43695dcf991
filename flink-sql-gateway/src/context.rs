//! Cancellation and deadlines for gateway calls.
//!
//! Every network call and every poll backoff in this crate runs under a
//! [`Context`]. Once the context is cancelled or its deadline passes, the
//! pending future is dropped, which aborts an in-flight HTTP request instead
//! of letting it complete and discarding the answer.
use crate::error::{FlinkError, Result};

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;


/// A cancellable, optionally deadline-bound execution context.
///
/// Contexts form a tree: cancelling a context cancels every context derived
/// from it, while a child's deadline can only be earlier than its parent's.
///
/// ```
/// use flink_sql_gateway::Context;
/// use std::time::Duration;
///
/// let ctx = Context::background().with_timeout(Duration::from_secs(30));
/// assert!(ctx.err().is_none());
///
/// ctx.cancel();
/// assert!(ctx.err().unwrap().is_cancellation());
/// ```
#[derive(Clone, Debug)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled by anyone but its owner and has no deadline.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A child context with the same deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// A child context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A child context that expires at `at`, or at the parent's deadline if that is earlier.
    pub fn with_deadline(&self, at: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < at => current,
            _ => at,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `None` while the context is live; the reason it is done otherwise.
    pub fn err(&self) -> Option<FlinkError> {
        if self.token.is_cancelled() {
            return Some(FlinkError::ContextCanceled);
        }
        match self.deadline {
            Some(at) if Instant::now() >= at => Some(FlinkError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Drive `fut` until it completes or the context is done, whichever comes first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
        if let Some(err) = self.err() {
            return Err(err);
        }

        let expired = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(FlinkError::ContextCanceled),
            _ = expired => Err(FlinkError::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }

    /// Wait for `duration`, returning early with an error if the context is done.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.run(tokio::time::sleep(duration)).await
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
