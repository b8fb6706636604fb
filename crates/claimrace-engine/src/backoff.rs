//! Retry delay policies for claim workers.

use std::time::Duration;

/// Delay before the attempt following failed attempt `attempt` (1-based).
pub trait BackoffPolicy: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

/// `base + step × attempt`, unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    pub base: Duration,
    pub step: Duration,
}

impl LinearBackoff {
    pub fn new(base: Duration, step: Duration) -> Self {
        Self { base, step }
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(50),
            step: Duration::from_millis(10),
        }
    }
}

impl BackoffPolicy for LinearBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_add(self.step.saturating_mul(attempt))
    }
}

/// Caps another policy at `max`.
#[derive(Debug, Clone, Copy)]
pub struct CappedBackoff<P> {
    inner: P,
    max: Duration,
}

impl<P: BackoffPolicy> CappedBackoff<P> {
    pub fn new(inner: P, max: Duration) -> Self {
        Self { inner, max }
    }
}

impl<P: BackoffPolicy> BackoffPolicy for CappedBackoff<P> {
    fn delay(&self, attempt: u32) -> Duration {
        self.inner.delay(attempt).min(self.max)
    }
}

/// `initial × 2^(attempt-1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.initial.saturating_mul(1u32 << exp).min(self.max)
    }
}
