//! Race orchestrator.
//!
//! Owns the session's cancellation latches, spawns the claim workers and the
//! relay monitor as parallel tasks, and joins them all before returning.
//!
//! Two latches are used. The session latch stops everything and is signalled
//! by a completed relay transfer or by process shutdown. The claims latch is
//! its child and is signalled by the winning worker; it stops the remaining
//! workers while the relay keeps polling for the claimed funds.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use claimrace_ledger::{DynLedgerQuery, DynLedgerSubmitter};

use crate::backoff::{BackoffPolicy, LinearBackoff};
use crate::cancel::RaceCancellation;
use crate::error::EngineResult;
use crate::event::RaceEvent;
use crate::fee::{FeePolicy, TieredFeePolicy};
use crate::relay::{RelayMonitor, RelayOutcome};
use crate::session::{RaceConfig, RaceSession};
use crate::sink::DynEventSink;
use crate::worker::{ClaimWorker, WorkerOutcome};

/// Summary of a finished session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Outcomes of the workers that joined, ordered by worker id.
    pub workers: Vec<(usize, WorkerOutcome)>,
    pub relay: RelayOutcome,
    /// Reason recorded by the first signal, claim win before relay.
    pub cancel_reason: Option<String>,
    pub elapsed: Duration,
}

impl SessionReport {
    /// Id of the worker whose claim was accepted.
    pub fn winner(&self) -> Option<usize> {
        self.workers
            .iter()
            .find(|(_, o)| matches!(o, WorkerOutcome::Succeeded { .. }))
            .map(|(id, _)| *id)
    }

    pub fn total_attempts(&self) -> u32 {
        self.workers.iter().map(|(_, o)| o.attempts()).sum()
    }

    /// True when every worker used its whole budget.
    pub fn all_exhausted(&self) -> bool {
        !self.workers.is_empty()
            && self
                .workers
                .iter()
                .all(|(_, o)| matches!(o, WorkerOutcome::Exhausted { .. }))
    }
}

/// Runs claim races against the ledger collaborators.
pub struct RaceOrchestrator {
    config: RaceConfig,
    query: DynLedgerQuery,
    submitter: DynLedgerSubmitter,
    fees: Arc<dyn FeePolicy>,
    backoff: Arc<dyn BackoffPolicy>,
    shutdown: Option<CancellationToken>,
}

impl RaceOrchestrator {
    /// Create an orchestrator with the configured fee tiers and linear backoff.
    pub fn new(
        config: RaceConfig,
        query: DynLedgerQuery,
        submitter: DynLedgerSubmitter,
    ) -> EngineResult<Self> {
        config.validate()?;
        let fees = TieredFeePolicy::new(config.competitive_fees.clone(), config.direct_fee)?;
        let backoff = LinearBackoff::new(config.backoff_base, config.backoff_step);

        Ok(Self {
            config,
            query,
            submitter,
            fees: Arc::new(fees),
            backoff: Arc::new(backoff),
            shutdown: None,
        })
    }

    pub fn with_fee_policy(mut self, fees: Arc<dyn FeePolicy>) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Cancel every session when `token` is cancelled (process shutdown).
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    /// Run one race to completion.
    ///
    /// Blocks until every worker and the relay monitor have terminated.
    pub async fn start(&self, session: RaceSession, sink: DynEventSink) -> SessionReport {
        let started = Instant::now();
        let cancel = Arc::new(match &self.shutdown {
            Some(parent) => RaceCancellation::child_of(parent),
            None => RaceCancellation::new(),
        });
        let claims = Arc::new(cancel.child());
        let session = Arc::new(session);

        info!(
            resource_id = %session.resource_id,
            workers = self.config.workers,
            max_attempts = self.config.max_attempts,
            sponsored = session.is_sponsored(),
            "Starting claim race"
        );
        sink.emit(RaceEvent::info(format!(
            "Starting {} claim workers{}",
            self.config.workers,
            if session.is_sponsored() {
                " with sponsor"
            } else {
                ""
            }
        )))
        .await;

        let mut workers = Vec::with_capacity(self.config.workers);
        for id in 1..=self.config.workers {
            let worker = ClaimWorker::new(
                id,
                session.clone(),
                self.submitter.clone(),
                self.fees.clone(),
                self.backoff.clone(),
                sink.clone(),
                claims.clone(),
                self.config.max_attempts,
            );
            workers.push((id, tokio::spawn(worker.run())));
        }

        let relay = RelayMonitor::new(
            session.clone(),
            self.query.clone(),
            self.submitter.clone(),
            sink.clone(),
            cancel.clone(),
            self.config.relay_poll_interval,
            self.config.relay_timeout,
            self.config.transfer_fee,
        );
        let relay = tokio::spawn(relay.run());

        let mut outcomes = Vec::with_capacity(workers.len());
        for (id, handle) in workers {
            match handle.await {
                Ok(outcome) => outcomes.push((id, outcome)),
                Err(e) => error!(worker_id = id, error = %e, "Claim worker task failed"),
            }
        }
        let relay = relay.await.unwrap_or_else(|e| {
            error!(error = %e, "Relay monitor task failed");
            RelayOutcome::Cancelled
        });

        let report = SessionReport {
            workers: outcomes,
            relay,
            cancel_reason: claims.reason().or_else(|| cancel.reason()),
            elapsed: started.elapsed(),
        };

        // Nobody signalled and no shutdown: every budget ran out.
        if !claims.is_cancelled() {
            sink.emit(RaceEvent::info(format!(
                "All claim attempts exhausted: {} workers x {} attempts without success",
                self.config.workers, self.config.max_attempts
            )))
            .await;
        }

        info!(
            resource_id = %session.resource_id,
            winner = ?report.winner(),
            attempts = report.total_attempts(),
            relay = ?report.relay,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Claim race finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::fee::FixedFeePolicy;
    use crate::sink::RecordingSink;
    use crate::testing::{session, ScriptedLedger};
    use chrono::Utc;
    use claimrace_core::{Address, Amount, ClaimableResource, Claimant, Fee, RawPredicate, ResourceId};
    use claimrace_ledger::SandboxLedger;
    use rust_decimal_macros::dec;

    fn config(workers: usize, max_attempts: u32) -> RaceConfig {
        RaceConfig {
            workers,
            max_attempts,
            ..RaceConfig::default()
        }
    }

    fn orchestrator(ledger: &Arc<ScriptedLedger>, config: RaceConfig) -> RaceOrchestrator {
        RaceOrchestrator::new(config, ledger.clone(), ledger.clone()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_one_success_across_workers() {
        // call 7 lands on some worker's second attempt
        let ledger = Arc::new(ScriptedLedger::new(Some(7)));
        let sink = Arc::new(RecordingSink::new());
        let report = orchestrator(&ledger, config(5, 200))
            .start((*session(true, Utc::now())).clone(), sink.clone())
            .await;

        let attempts = sink.of_kind(EventKind::Attempt);
        assert_eq!(attempts.iter().filter(|e| e.success).count(), 1);
        assert!(report.winner().is_some());
        assert_eq!(report.workers.len(), 5);
        assert!(report
            .cancel_reason
            .as_deref()
            .is_some_and(|r| r.contains("claimed")));
        // every worker stops far below its budget
        assert!(report.total_attempts() < 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_attempt_after_signal_plus_checkpoint() {
        let ledger = Arc::new(ScriptedLedger::new(Some(12)));
        let sink = Arc::new(RecordingSink::new());
        let cfg = config(5, 200);
        let checkpoint = cfg.relay_poll_interval;
        orchestrator(&ledger, cfg)
            .start((*session(false, Utc::now())).clone(), sink.clone())
            .await;

        let recorded = sink.recorded();
        let winner_at = recorded
            .iter()
            .find(|r| r.event.action == EventKind::Attempt && r.event.success)
            .map(|r| r.at)
            .unwrap();
        for r in recorded
            .iter()
            .filter(|r| r.event.action == EventKind::Attempt)
        {
            assert!(r.at <= winner_at + checkpoint);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_unlocked_single_worker_scenario() {
        let ledger = Arc::new(ScriptedLedger::new(Some(3)));
        let sink = Arc::new(RecordingSink::new());
        let report = orchestrator(&ledger, config(1, 200))
            .with_fee_policy(Arc::new(FixedFeePolicy(Fee(15_000_000))))
            .start((*session(false, Utc::now())).clone(), sink.clone())
            .await;

        let attempts = sink.of_kind(EventKind::Attempt);
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts.iter().filter(|e| !e.success).count(), 2);
        assert_eq!(attempts.iter().filter(|e| e.success).count(), 1);

        assert_eq!(report.winner(), Some(1));
        assert!(matches!(report.relay, RelayOutcome::Relayed { .. }));
        assert_eq!(ledger.transfers().len(), 1);

        let transfer_events: Vec<_> = sink
            .of_kind(EventKind::Success)
            .into_iter()
            .filter(|e| e.message.starts_with("Transfer completed"))
            .collect();
        assert_eq!(transfer_events.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_win_is_relayed_to_destination() {
        let ledger = Arc::new(SandboxLedger::default());
        ledger.fund(&Address::new("GMAIN"), Amount::new(dec!(1.48)));
        ledger.fund(&Address::new("GSPONSOR"), Amount::new(dec!(50)));
        ledger.create_resource(ClaimableResource {
            id: ResourceId::new("00c0ffee"),
            amount: Amount::new(dec!(100)),
            asset: "native".to_string(),
            claimants: vec![Claimant {
                destination: Address::new("GMAIN"),
                predicate: RawPredicate::unconditional(),
            }],
        });
        let sink = Arc::new(RecordingSink::new());

        let report = RaceOrchestrator::new(config(5, 200), ledger.clone(), ledger.clone())
            .unwrap()
            .start((*session(true, Utc::now())).clone(), sink.clone())
            .await;

        assert!(report.winner().is_some());
        assert!(report
            .cancel_reason
            .as_deref()
            .is_some_and(|r| r.contains("claimed")));
        // 1.48 + 100 claimed, less 2 x 0.49 reserve and 0.5 fee headroom
        match &report.relay {
            RelayOutcome::Relayed { amount, .. } => assert_eq!(*amount, Amount::new(dec!(100))),
            other => panic!("relay did not transfer: {other:?}"),
        }
        assert_eq!(
            ledger.balance_of(&Address::new("GDEST")),
            Some(Amount::new(dec!(100)))
        );
        assert_eq!(
            sink.of_kind(EventKind::Success)
                .iter()
                .filter(|e| e.message.starts_with("Transfer completed"))
                .count(),
            1
        );
        assert!(!sink.events().iter().any(|e| e.message.contains("exhausted")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sponsor_all_workers_exhausted() {
        let ledger = Arc::new(ScriptedLedger::new(None));
        let sink = Arc::new(RecordingSink::new());
        let report = orchestrator(&ledger, config(5, 8))
            .start((*session(true, Utc::now())).clone(), sink.clone())
            .await;

        assert!(report.all_exhausted());
        assert_eq!(report.relay, RelayOutcome::TimedOut);
        assert_eq!(sink.of_kind(EventKind::Attempt).len(), 5 * 8);
        assert!(sink.of_kind(EventKind::Success).is_empty());
        assert!(sink
            .of_kind(EventKind::Attempt)
            .iter()
            .all(|e| !e.success));

        let events = sink.events();
        let last = events.last().unwrap();
        assert_eq!(last.action, EventKind::Info);
        assert!(last.message.contains("exhausted"));
        assert_eq!(
            events
                .iter()
                .filter(|e| e.message.contains("exhausted"))
                .count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_token_cancels_session() {
        let ledger = Arc::new(ScriptedLedger::new(None));
        let sink = Arc::new(RecordingSink::new());
        let shutdown = CancellationToken::new();
        let orch = orchestrator(&ledger, config(3, 200)).with_shutdown(shutdown.clone());

        let handle = {
            let sink = sink.clone();
            tokio::spawn(async move {
                orch.start((*session(false, Utc::now())).clone(), sink)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();

        let report = handle.await.unwrap();
        assert!(report
            .workers
            .iter()
            .all(|(_, o)| matches!(o, WorkerOutcome::Cancelled { .. })));
        assert_eq!(report.relay, RelayOutcome::Cancelled);
        assert!(report.cancel_reason.is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let ledger = Arc::new(ScriptedLedger::new(None));
        let result = RaceOrchestrator::new(config(0, 1), ledger.clone(), ledger);
        assert!(result.is_err());
    }
}
