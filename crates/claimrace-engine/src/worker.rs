//! Claim worker.
//!
//! One concurrent actor that repeatedly submits the claim until it succeeds,
//! exhausts its attempt budget, or observes cancellation. Every attempt is
//! reported to the sink. Failures of any kind are retried identically; the
//! classification only feeds logs and metrics.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info};

use claimrace_core::TxHash;
use claimrace_ledger::DynLedgerSubmitter;
use claimrace_telemetry::Metrics;

use crate::backoff::BackoffPolicy;
use crate::cancel::RaceCancellation;
use crate::event::{AttemptOutcome, AttemptRecord, RaceEvent};
use crate::fee::{FeeContext, FeePolicy};
use crate::session::RaceSession;
use crate::sink::DynEventSink;

/// Terminal state of a claim worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// This worker's claim was accepted.
    Succeeded { attempts: u32, hash: TxHash },
    /// Attempt budget used up without success.
    Exhausted { attempts: u32 },
    /// Stopped at a checkpoint after cancellation.
    Cancelled { attempts: u32 },
}

impl WorkerOutcome {
    /// Submissions this worker made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Exhausted { attempts }
            | Self::Cancelled { attempts } => *attempts,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::Exhausted { .. } => "exhausted",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

/// A single racing claim actor.
pub struct ClaimWorker {
    id: usize,
    session: Arc<RaceSession>,
    submitter: DynLedgerSubmitter,
    fees: Arc<dyn FeePolicy>,
    backoff: Arc<dyn BackoffPolicy>,
    sink: DynEventSink,
    cancel: Arc<RaceCancellation>,
    max_attempts: u32,
}

impl ClaimWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        session: Arc<RaceSession>,
        submitter: DynLedgerSubmitter,
        fees: Arc<dyn FeePolicy>,
        backoff: Arc<dyn BackoffPolicy>,
        sink: DynEventSink,
        cancel: Arc<RaceCancellation>,
        max_attempts: u32,
    ) -> Self {
        Self {
            id,
            session,
            submitter,
            fees,
            backoff,
            sink,
            cancel,
            max_attempts,
        }
    }

    /// Race until success, exhaustion or cancellation.
    pub async fn run(self) -> WorkerOutcome {
        let outcome = self.attempt_loop().await;
        Metrics::worker_finished(outcome.label());
        debug!(
            worker_id = self.id,
            outcome = outcome.label(),
            attempts = outcome.attempts(),
            "Claim worker finished"
        );
        outcome
    }

    async fn attempt_loop(&self) -> WorkerOutcome {
        let mut attempts = 0;

        for attempt in 1..=self.max_attempts {
            // Checkpoint before any network call
            if self.cancel.is_cancelled() {
                return WorkerOutcome::Cancelled { attempts };
            }

            let fee = self.fees.next_fee(&FeeContext {
                worker_id: self.id,
                attempt,
                sponsored: self.session.is_sponsored(),
            });
            let submission = self.session.claim_submission(fee);

            let started = Instant::now();
            let result = self.submitter.submit_claim(submission).await;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            attempts = attempt;

            match result {
                Ok(receipt) => {
                    Metrics::claim_succeeded(latency_ms);
                    self.cancel.signal(&format!(
                        "worker {} claimed on attempt {}",
                        self.id, attempt
                    ));

                    let amount = receipt.amount.unwrap_or(self.session.amount_hint);
                    info!(
                        worker_id = self.id,
                        attempt,
                        fee = fee.stroops(),
                        hash = %receipt.hash,
                        amount = %amount,
                        "Claim accepted"
                    );

                    let record = AttemptRecord {
                        worker_id: self.id,
                        attempt,
                        at: Utc::now(),
                        outcome: AttemptOutcome::Success {
                            hash: receipt.hash.clone(),
                            amount: Some(amount),
                        },
                    };
                    self.sink.emit(RaceEvent::from(&record)).await;
                    self.sink
                        .emit(
                            RaceEvent::success(format!(
                                "Successfully claimed {} - Hash: {}",
                                amount, receipt.hash
                            ))
                            .with_amount(amount),
                        )
                        .await;

                    return WorkerOutcome::Succeeded {
                        attempts,
                        hash: receipt.hash,
                    };
                }
                Err(err) => {
                    Metrics::claim_failed(err.kind.as_str(), latency_ms);
                    debug!(
                        worker_id = self.id,
                        attempt,
                        fee = fee.stroops(),
                        kind = %err.kind,
                        reason = %err.reason,
                        "Claim attempt failed"
                    );

                    let record = AttemptRecord {
                        worker_id: self.id,
                        attempt,
                        at: Utc::now(),
                        outcome: AttemptOutcome::Failure {
                            kind: err.kind,
                            reason: err.reason,
                        },
                    };
                    self.sink.emit(RaceEvent::from(&record)).await;
                }
            }

            if attempt < self.max_attempts {
                self.pause(self.backoff.delay(attempt)).await;
            }
        }

        info!(worker_id = self.id, attempts, "Claim attempts exhausted");
        WorkerOutcome::Exhausted { attempts }
    }

    /// Backoff sleep that ends early on cancellation.
    async fn pause(&self, delay: Duration) {
        if delay.is_zero() {
            tokio::task::yield_now().await;
            return;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
