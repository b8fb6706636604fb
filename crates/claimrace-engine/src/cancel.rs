//! Session cancellation latch.
//!
//! Wraps a [`CancellationToken`] with first-signaller bookkeeping. Any actor
//! may signal; only the first signal records its reason and instant. Actors
//! observe the latch cooperatively at their checkpoints.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::info;

/// Once-settable cancellation shared by every actor of a race session.
#[derive(Debug)]
pub struct RaceCancellation {
    token: CancellationToken,
    /// Whether `signal` has been called.
    signalled: AtomicBool,
    /// Reason passed by the first signaller.
    reason: Mutex<Option<String>>,
    /// When the first signal happened.
    signalled_at: Mutex<Option<Instant>>,
}

impl RaceCancellation {
    /// Create an unsignalled latch.
    pub(crate) fn new() -> Self {
        Self::from_token(CancellationToken::new())
    }

    /// Create a latch that is also cancelled when `parent` is cancelled.
    pub(crate) fn child_of(parent: &CancellationToken) -> Self {
        Self::from_token(parent.child_token())
    }

    /// Create a latch cancelled by this one, but whose own signal does not
    /// reach back up.
    pub(crate) fn child(&self) -> Self {
        Self::child_of(&self.token)
    }

    fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            signalled: AtomicBool::new(false),
            reason: Mutex::new(None),
            signalled_at: Mutex::new(None),
        }
    }

    /// Signal cancellation.
    ///
    /// Idempotent: returns `true` only for the first caller, whose reason and
    /// time are kept.
    pub fn signal(&self, reason: &str) -> bool {
        if self.signalled.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.reason.lock() = Some(reason.to_string());
        *self.signalled_at.lock() = Some(Instant::now());
        self.token.cancel();
        info!(reason, "Race cancelled");
        true
    }

    /// Checkpoint: true once the latch or its parent has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when the session is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Reason recorded by the first signaller.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }

    /// Instant of the first signal.
    #[must_use]
    pub fn signalled_at(&self) -> Option<Instant> {
        *self.signalled_at.lock()
    }

    /// Time since the first signal.
    #[must_use]
    pub fn elapsed_since_signal(&self) -> Option<Duration> {
        self.signalled_at.lock().map(|t| t.elapsed())
    }
}
