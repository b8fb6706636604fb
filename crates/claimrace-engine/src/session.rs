//! Race configuration and per-request session state.

use std::time::Duration;

use chrono::{DateTime, Utc};

use claimrace_core::{Address, Amount, Fee, ResourceId, Signer};
use claimrace_ledger::{ClaimSubmission, TransferSubmission};

use crate::error::{EngineError, EngineResult};
use crate::fee::{DEFAULT_COMPETITIVE_FEES, DEFAULT_DIRECT_FEE, DEFAULT_TRANSFER_FEE};

/// Tunables shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceConfig {
    /// Number of concurrent claim workers.
    pub workers: usize,
    /// Attempt budget per worker.
    pub max_attempts: u32,
    /// How long before the unlock instant the race starts.
    pub lead_window: Duration,
    /// Linear backoff base.
    pub backoff_base: Duration,
    /// Linear backoff increment per attempt.
    pub backoff_step: Duration,
    /// Sponsor-mode fee tiers.
    pub competitive_fees: Vec<Fee>,
    /// Fee for unsponsored claims.
    pub direct_fee: Fee,
    /// Fee for relay transfers.
    pub transfer_fee: Fee,
    /// Relay monitor polling interval.
    pub relay_poll_interval: Duration,
    /// Relay monitor overall deadline.
    pub relay_timeout: Duration,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            max_attempts: 200,
            lead_window: Duration::from_secs(5),
            backoff_base: Duration::from_millis(50),
            backoff_step: Duration::from_millis(10),
            competitive_fees: DEFAULT_COMPETITIVE_FEES.iter().copied().map(Fee).collect(),
            direct_fee: Fee(DEFAULT_DIRECT_FEE),
            transfer_fee: Fee(DEFAULT_TRANSFER_FEE),
            relay_poll_interval: Duration::from_millis(10),
            relay_timeout: Duration::from_secs(30),
        }
    }
}

impl RaceConfig {
    /// Reject configurations that cannot run a race.
    pub fn validate(&self) -> EngineResult<()> {
        if self.workers == 0 {
            return Err(EngineError::InvalidConfig("workers must be > 0".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(EngineError::InvalidConfig(
                "max_attempts must be > 0".to_string(),
            ));
        }
        if self.relay_poll_interval.is_zero() {
            return Err(EngineError::InvalidConfig(
                "relay_poll_interval must be > 0".to_string(),
            ));
        }
        if self.relay_timeout.is_zero() {
            return Err(EngineError::InvalidConfig(
                "relay_timeout must be > 0".to_string(),
            ));
        }
        if self.competitive_fees.is_empty() {
            return Err(EngineError::InvalidConfig(
                "competitive_fees must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Immutable inputs of one claim race.
#[derive(Debug, Clone)]
pub struct RaceSession {
    pub primary: Signer,
    pub sponsor: Option<Signer>,
    /// Where relayed funds go.
    pub destination: Address,
    /// Amount the observer expects to claim.
    pub amount_hint: Amount,
    pub resource_id: ResourceId,
    pub unlock_at: DateTime<Utc>,
}

impl RaceSession {
    pub fn is_sponsored(&self) -> bool {
        self.sponsor.is_some()
    }

    /// Fee payer for claims: the sponsor when configured, else the primary.
    pub fn fee_payer(&self) -> &Signer {
        self.sponsor.as_ref().unwrap_or(&self.primary)
    }

    pub fn claim_submission(&self, fee: Fee) -> ClaimSubmission {
        ClaimSubmission {
            claimant: self.primary.clone(),
            fee_payer: self.fee_payer().clone(),
            resource_id: self.resource_id.clone(),
            fee,
        }
    }

    pub fn transfer_submission(&self, amount: Amount, fee: Fee) -> TransferSubmission {
        TransferSubmission {
            signer: self.primary.clone(),
            amount,
            destination: self.destination.clone(),
            fee,
        }
    }
}
