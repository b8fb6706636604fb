//! Request handling behind the observer endpoints.
//!
//! Turns one claim request into a race session: resolve keys, fetch the
//! resource, resolve its unlock instant for the primary wallet, then hand the
//! session to the scheduler. Setup failures are reported once as an `error`
//! event and no race is started.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use claimrace_core::{resolve_unlock_for, Address, Amount, ResourceId, SecretPhrase, Signer};
use claimrace_engine::{
    DynEventSink, RaceEvent, RaceOrchestrator, RaceSession, SessionReport, SessionScheduler,
};
use claimrace_ledger::{DynKeyResolver, DynLedgerQuery};
use claimrace_telemetry::Metrics;

use crate::error::{ObserverError, ObserverResult};
use crate::types::{ClaimRequest, LockedBalanceView, LoginRequest, LoginResponse, TransactionView};

/// Operations listed in the account overview.
const RECENT_OPERATIONS_LIMIT: usize = 5;

pub struct ClaimService {
    query: DynLedgerQuery,
    keys: DynKeyResolver,
    orchestrator: Arc<RaceOrchestrator>,
    scheduler: SessionScheduler,
}

impl ClaimService {
    pub fn new(
        query: DynLedgerQuery,
        keys: DynKeyResolver,
        orchestrator: Arc<RaceOrchestrator>,
    ) -> Self {
        let scheduler = SessionScheduler::new(orchestrator.config().lead_window);
        Self {
            query,
            keys,
            orchestrator,
            scheduler,
        }
    }

    /// Handle the raw first message of an observer socket.
    ///
    /// Returns the race report, or `None` when the session was rejected.
    pub async fn handle(&self, raw: &str, sink: DynEventSink) -> Option<SessionReport> {
        let request = match serde_json::from_str::<ClaimRequest>(raw) {
            Ok(request) => request,
            Err(e) => {
                self.reject(ObserverError::InvalidRequest(format!("malformed JSON: {e}")), &sink)
                    .await;
                return None;
            }
        };

        let (primary, sponsor) = match self.resolve_signers(&request) {
            Ok(signers) => signers,
            Err(e) => {
                self.reject(e, &sink).await;
                return None;
            }
        };

        sink.emit(RaceEvent::server_time(Utc::now())).await;

        let session = match self.prepare(&request, primary, sponsor).await {
            Ok(session) => session,
            Err(e) => {
                self.reject(e, &sink).await;
                return None;
            }
        };
        sink.emit(RaceEvent::unlock_time_found(session.unlock_at))
            .await;

        Metrics::session_started();
        let report = self
            .scheduler
            .run(&self.orchestrator, session, sink)
            .await;
        Metrics::session_finished();
        Some(report)
    }

    fn resolve_signers(&self, request: &ClaimRequest) -> ObserverResult<(Signer, Option<Signer>)> {
        let primary = self
            .keys
            .resolve(SecretPhrase::new(request.seed_phrase.trim()))
            .map_err(|_| ObserverError::InvalidKey { role: "main" })?;

        let sponsor = request
            .sponsor()
            .map(|phrase| {
                self.keys
                    .resolve(SecretPhrase::new(phrase))
                    .map_err(|_| ObserverError::InvalidKey { role: "sponsor" })
            })
            .transpose()?;

        Ok((primary, sponsor))
    }

    /// Validate the request and resolve the unlock instant.
    async fn prepare(
        &self,
        request: &ClaimRequest,
        primary: Signer,
        sponsor: Option<Signer>,
    ) -> ObserverResult<RaceSession> {
        let destination = Address::parse(&request.withdrawal_address)
            .map_err(|e| ObserverError::InvalidRequest(e.to_string()))?;
        if request.locked_balance_id.trim().is_empty() {
            return Err(ObserverError::InvalidRequest(
                "locked_balance_id is empty".to_string(),
            ));
        }
        let amount_hint = if request.amount.trim().is_empty() {
            Amount::ZERO
        } else {
            request
                .amount
                .parse::<Amount>()
                .map_err(|e| ObserverError::InvalidRequest(e.to_string()))?
        };

        let resource_id = ResourceId::new(&request.locked_balance_id);
        let resource = self
            .query
            .claimable_resource(resource_id.clone())
            .await
            .map_err(ObserverError::ResourceLookup)?;

        let unlock_at = resolve_unlock_for(&resource, primary.address())
            .map_err(ObserverError::UnlockUnresolved)?;

        info!(
            resource_id = %resource_id,
            unlock_at = %unlock_at,
            claimant = %primary.address(),
            sponsored = sponsor.is_some(),
            "Claim session prepared"
        );

        Ok(RaceSession {
            primary,
            sponsor,
            destination,
            amount_hint,
            resource_id,
            unlock_at,
        })
    }

    async fn reject(&self, err: ObserverError, sink: &DynEventSink) {
        warn!(error = %err, "Claim session rejected");
        Metrics::session_rejected(err.label());
        sink.emit(RaceEvent::error(err.to_string())).await;
    }

    /// Account overview for a secret: address, spendable balance, recent
    /// operations and locked resources. The lookups run concurrently.
    pub async fn account_overview(&self, request: LoginRequest) -> ObserverResult<LoginResponse> {
        let signer = self
            .keys
            .resolve(SecretPhrase::new(request.seed_phrase.trim()))
            .map_err(|_| ObserverError::InvalidKey { role: "main" })?;
        let address = signer.address().clone();

        let (balance, operations, resources) = tokio::try_join!(
            self.query.spendable_balance(address.clone()),
            self.query
                .recent_operations(address.clone(), RECENT_OPERATIONS_LIMIT),
            self.query.claimable_for(address.clone()),
        )?;

        let locked_balances = resources
            .iter()
            .map(|r| LockedBalanceView {
                id: r.id.to_string(),
                amount: r.amount.to_string(),
                asset: r.asset.clone(),
                unlock_at: resolve_unlock_for(r, &address).ok(),
            })
            .collect();

        Ok(LoginResponse {
            wallet_address: address.to_string(),
            available_balance: balance.to_string(),
            transactions: operations.into_iter().map(TransactionView::from).collect(),
            locked_balances,
        })
    }
}
