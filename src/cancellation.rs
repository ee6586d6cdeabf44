//! Cooperative cancellation and per-call deadlines for suspending operations.
//!
//! Spec §5 requires every suspending resolver call to honor an externally
//! supplied cancellation signal and a total-operation deadline. None of the
//! usual `tokio-util::CancellationToken` users show up anywhere in this
//! codebase's dependency tree, so this is a small self-contained primitive
//! instead of pulling in a crate used nowhere else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cloneable, cooperative cancellation flag.
///
/// Cloning shares the same underlying flag — cancelling any clone cancels
/// all of them. This is the single cancellation primitive threaded through
/// the fetch-gated resolver paths.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A total-operation deadline, measured from the instant it was created.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Whether the deadline has already passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time remaining until the deadline, or `Duration::ZERO` if expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

/// Outcome of a cancellable, deadline-bound operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The operation completed (the wrapped result should be inspected).
    Completed,
    /// Cancellation was observed before completion.
    Cancelled,
    /// The deadline elapsed before completion.
    DeadlineExceeded,
}

#[cfg(feature = "fetch")]
/// Race a future against cancellation and an optional deadline.
///
/// Checks `token` up front (cheap, synchronous) so an already-cancelled
/// call never starts the future, then races the future against the
/// deadline (if any) using `tokio::time::timeout`.
pub async fn run_cancellable<F, T>(
    token: &CancellationToken,
    deadline: Option<Deadline>,
    fut: F,
) -> Result<T, CancelOutcome>
where
    F: std::future::Future<Output = T>,
{
    if token.is_cancelled() {
        return Err(CancelOutcome::Cancelled);
    }

    match deadline {
        Some(d) => match tokio::time::timeout(d.remaining(), fut).await {
            Ok(v) => {
                if token.is_cancelled() {
                    Err(CancelOutcome::Cancelled)
                } else {
                    Ok(v)
                }
            }
            Err(_) => Err(CancelOutcome::DeadlineExceeded),
        },
        None => {
            let v = fut.await;
            if token.is_cancelled() {
                Err(CancelOutcome::Cancelled)
            } else {
                Ok(v)
            }
        }
    }
}
