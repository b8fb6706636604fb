//! Balance relay monitor.
//!
//! Polls the primary account's spendable balance on a fixed interval and
//! forwards it to the destination as soon as it is nonzero. A successful
//! transfer ends the session. The monitor gives up after an overall deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use claimrace_core::{Amount, Fee, TxHash};
use claimrace_ledger::{DynLedgerQuery, DynLedgerSubmitter};
use claimrace_telemetry::Metrics;

use crate::cancel::RaceCancellation;
use crate::event::RaceEvent;
use crate::session::RaceSession;
use crate::sink::DynEventSink;

/// Terminal state of the relay monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Relayed { hash: TxHash, amount: Amount },
    Cancelled,
    TimedOut,
}

pub struct RelayMonitor {
    session: Arc<RaceSession>,
    query: DynLedgerQuery,
    submitter: DynLedgerSubmitter,
    sink: DynEventSink,
    cancel: Arc<RaceCancellation>,
    poll_interval: Duration,
    timeout: Duration,
    transfer_fee: Fee,
}

impl RelayMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: Arc<RaceSession>,
        query: DynLedgerQuery,
        submitter: DynLedgerSubmitter,
        sink: DynEventSink,
        cancel: Arc<RaceCancellation>,
        poll_interval: Duration,
        timeout: Duration,
        transfer_fee: Fee,
    ) -> Self {
        Self {
            session,
            query,
            submitter,
            sink,
            cancel,
            poll_interval,
            timeout,
            transfer_fee,
        }
    }

    /// Poll until relayed, cancelled or timed out.
    pub async fn run(self) -> RelayOutcome {
        let deadline = Instant::now() + self.timeout;
        let address = self.session.primary.address().clone();

        loop {
            if self.cancel.is_cancelled() {
                debug!("Relay monitor cancelled");
                return RelayOutcome::Cancelled;
            }
            if Instant::now() >= deadline {
                info!(timeout_ms = self.timeout.as_millis() as u64, "Relay monitor timed out");
                self.sink
                    .emit(RaceEvent::info(format!(
                        "Relay stopped: no spendable balance within {}s",
                        self.timeout.as_secs()
                    )))
                    .await;
                return RelayOutcome::TimedOut;
            }

            match self.query.spendable_balance(address.clone()).await {
                Ok(balance) if balance.is_positive() => {
                    if let Some(outcome) = self.relay(balance).await {
                        return outcome;
                    }
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Balance query failed"),
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Transfer the full spendable balance. `None` means keep polling.
    async fn relay(&self, balance: Amount) -> Option<RelayOutcome> {
        let submission = self.session.transfer_submission(balance, self.transfer_fee);

        match self.submitter.submit_transfer(submission).await {
            Ok(hash) => {
                Metrics::relay_transfer(true);
                info!(
                    amount = %balance,
                    destination = %self.session.destination,
                    hash = %hash,
                    "Relay transfer accepted"
                );
                self.cancel.signal("relay transfer completed");
                self.sink
                    .emit(
                        RaceEvent::success(format!("Transfer completed - Hash: {hash}"))
                            .with_amount(balance),
                    )
                    .await;
                Some(RelayOutcome::Relayed {
                    hash,
                    amount: balance,
                })
            }
            Err(err) => {
                Metrics::relay_transfer(false);
                warn!(kind = %err.kind, reason = %err.reason, amount = %balance, "Relay transfer failed");
                self.sink
                    .emit(RaceEvent::info(format!(
                        "Transfer of {balance} failed: {}, retrying",
                        err.reason
                    )))
                    .await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::sink::RecordingSink;
    use crate::testing::{session, ScriptedLedger};
    use chrono::Utc;

    struct Harness {
        ledger: Arc<ScriptedLedger>,
        sink: Arc<RecordingSink>,
        cancel: Arc<RaceCancellation>,
    }

    impl Harness {
        fn new(ledger: ScriptedLedger) -> Self {
            Self {
                ledger: Arc::new(ledger),
                sink: Arc::new(RecordingSink::new()),
                cancel: Arc::new(RaceCancellation::new()),
            }
        }

        fn monitor(&self, timeout: Duration) -> RelayMonitor {
            RelayMonitor::new(
                session(false, Utc::now()),
                self.ledger.clone(),
                self.ledger.clone(),
                self.sink.clone(),
                self.cancel.clone(),
                Duration::from_millis(10),
                timeout,
                Fee(5_000_000),
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_relays_once_and_stops() {
        let h = Harness::new(ScriptedLedger::new(None).already_funded());
        let outcome = h.monitor(Duration::from_secs(30)).run().await;

        assert!(matches!(outcome, RelayOutcome::Relayed { .. }));
        assert_eq!(h.ledger.balance_queries(), 1);
        assert_eq!(h.sink.of_kind(EventKind::Success).len(), 1);
        assert!(h.cancel.is_cancelled());

        let transfers = h.ledger.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].amount, h.ledger.payout());
        assert_eq!(transfers[0].destination.as_str(), "GDEST");
        assert_eq!(transfers[0].fee, Fee(5_000_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_failure_keeps_polling_at_fixed_interval() {
        let h = Harness::new(ScriptedLedger::new(None).already_funded().failing_transfers(2));
        let start = Instant::now();
        let outcome = h.monitor(Duration::from_secs(30)).run().await;

        assert!(matches!(outcome, RelayOutcome::Relayed { .. }));
        assert_eq!(h.ledger.balance_queries(), 3);
        assert_eq!(h.sink.of_kind(EventKind::Info).len(), 2);
        assert_eq!(h.sink.of_kind(EventKind::Success).len(), 1);
        assert_eq!(Instant::now() - start, Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_balance() {
        let h = Harness::new(ScriptedLedger::new(None));
        let start = Instant::now();
        let outcome = h.monitor(Duration::from_millis(100)).run().await;

        assert_eq!(outcome, RelayOutcome::TimedOut);
        assert_eq!(Instant::now() - start, Duration::from_millis(100));
        assert!(h.ledger.transfers().is_empty());
        assert!(!h.cancel.is_cancelled());
        assert_eq!(h.sink.of_kind(EventKind::Info).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_cancellation() {
        let h = Harness::new(ScriptedLedger::new(None));
        let handle = tokio::spawn(h.monitor(Duration::from_secs(30)).run());

        tokio::time::sleep(Duration::from_millis(35)).await;
        h.cancel.signal("shutdown");

        assert_eq!(handle.await.unwrap(), RelayOutcome::Cancelled);
        assert!(h.ledger.balance_queries() <= 5);
        assert!(h.sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_win_does_not_stop_relay() {
        let h = Harness::new(ScriptedLedger::new(None).already_funded());
        let claims = h.cancel.child();
        claims.signal("worker 1 claimed on attempt 1");

        let outcome = h.monitor(Duration::from_secs(30)).run().await;

        assert!(matches!(outcome, RelayOutcome::Relayed { .. }));
        assert_eq!(h.ledger.transfers().len(), 1);
        assert_eq!(
            h.cancel.reason().as_deref(),
            Some("relay transfer completed")
        );
    }
}
