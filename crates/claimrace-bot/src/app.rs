//! Application wiring.
//!
//! Builds the sandbox ledger from config, the race orchestrator on top of it,
//! and the claim service shared by the observer server and the one-shot
//! `race` command. Process shutdown cancels every running race.

use std::sync::Arc;

use chrono::Utc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use claimrace_core::{
    Address, Amount, ClaimableResource, Claimant, RawPredicate, ResourceId,
};
use claimrace_engine::{DynEventSink, RaceOrchestrator, SessionReport};
use claimrace_ledger::{HorizonClient, LedgerQuery, SandboxKeyResolver, SandboxLedger};
use claimrace_observer::{run_server, serve, ClaimService, ObserverState};

use crate::config::{AppConfig, LedgerSection, SandboxSection};
use crate::error::{AppError, AppResult};

/// Main application.
pub struct Application {
    config: AppConfig,
    ledger: Arc<SandboxLedger>,
    service: Arc<ClaimService>,
    shutdown: CancellationToken,
}

impl Application {
    /// Create the application with a seeded sandbox ledger.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let ledger = Arc::new(SandboxLedger::new(config.sandbox.ledger_config()));
        seed_sandbox(&ledger, &config.sandbox);

        let shutdown = CancellationToken::new();
        let orchestrator = RaceOrchestrator::new(
            config.race.to_race_config(),
            ledger.clone(),
            ledger.clone(),
        )?
        .with_shutdown(shutdown.clone());

        let service = Arc::new(ClaimService::new(
            ledger.clone(),
            Arc::new(SandboxKeyResolver),
            Arc::new(orchestrator),
        ));

        info!(
            network = %config.ledger.network,
            workers = config.race.workers,
            accounts = config.sandbox.accounts.len(),
            resources = config.sandbox.resources.len(),
            "Application initialized"
        );

        Ok(Self {
            config,
            ledger,
            service,
            shutdown,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<SandboxLedger> {
        &self.ledger
    }

    /// Token that cancels the server and every running race.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the observer server on the configured port until shutdown.
    pub async fn run(&self) -> AppResult<()> {
        run_server(
            self.service.clone(),
            self.config.server.clone(),
            self.shutdown.clone(),
        )
        .await?;
        info!("Observer server stopped");
        Ok(())
    }

    /// Serve on an already-bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> AppResult<()> {
        let state = ObserverState::new(self.service.clone(), self.config.server.clone());
        serve(listener, state, self.shutdown.clone()).await?;
        Ok(())
    }

    /// Run a single race from a raw claim request, streaming events to `sink`.
    pub async fn race(&self, raw_request: &str, sink: DynEventSink) -> AppResult<SessionReport> {
        self.service
            .handle(raw_request, sink)
            .await
            .ok_or(AppError::SessionRejected)
    }
}

/// Fund accounts and create resources from the sandbox section.
fn seed_sandbox(ledger: &SandboxLedger, sandbox: &SandboxSection) {
    for account in &sandbox.accounts {
        let address = SandboxKeyResolver::address_for(&account.phrase);
        info!(address = %address, balance = %account.balance, "Funding sandbox account");
        ledger.fund(&address, Amount::new(account.balance));
    }

    let now = Utc::now().timestamp();
    for resource in &sandbox.resources {
        ledger.create_resource(ClaimableResource {
            id: ResourceId::new(resource.id.trim()),
            amount: Amount::new(resource.amount),
            asset: resource.asset.clone(),
            claimants: vec![Claimant {
                destination: SandboxKeyResolver::address_for(&resource.claimant_phrase),
                predicate: RawPredicate::not_before_epoch(now + resource.unlock_in_secs),
            }],
        });
    }
}

/// Spendable balance and claimable resources of a live account.
pub async fn inspect_account(
    ledger: &LedgerSection,
    address: Address,
) -> AppResult<(Amount, Vec<ClaimableResource>)> {
    let url = ledger.horizon_url.as_deref().ok_or_else(|| {
        AppError::Config(format!(
            "ledger.horizon_url is required to inspect {} accounts",
            ledger.network
        ))
    })?;

    let client = HorizonClient::new(url)?;
    let reserve = client.refresh_base_reserve().await?;
    info!(network = %ledger.network, base_reserve = %reserve, "Horizon reachable");

    let (balance, resources) = tokio::try_join!(
        client.spendable_balance(address.clone()),
        client.claimable_for(address),
    )?;
    Ok((balance, resources))
}
