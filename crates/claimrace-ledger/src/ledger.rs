//! Ledger collaborator traits.
//!
//! Trait-based seams between the race engine and the ledger, allowing:
//! - Dependency injection of scripted ledgers in tests
//! - Separation of transaction signing from the race logic
//! - Swapping the sandbox for a live network adapter

use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use claimrace_core::{Address, Amount, ClaimableResource, Fee, ResourceId, Signer, TxHash};

use crate::error::{LedgerResult, SubmitError};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// One claim operation to submit.
#[derive(Debug, Clone)]
pub struct ClaimSubmission {
    /// Designated claimant (always signs).
    pub claimant: Signer,
    /// Transaction source and fee payer. Equal to `claimant` when no sponsor
    /// is configured; otherwise both sign.
    pub fee_payer: Signer,
    pub resource_id: ResourceId,
    pub fee: Fee,
}

impl ClaimSubmission {
    /// True when a separate sponsor pays the fee.
    pub fn is_sponsored(&self) -> bool {
        self.fee_payer.address() != self.claimant.address()
    }
}

/// One payment of native funds.
#[derive(Debug, Clone)]
pub struct TransferSubmission {
    pub signer: Signer,
    pub amount: Amount,
    pub destination: Address,
    pub fee: Fee,
}

/// Result of an accepted claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub hash: TxHash,
    /// Claimed amount when the ledger reports it.
    pub amount: Option<Amount>,
}

/// One operation recorded against an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    pub id: String,
    /// Ledger operation type, e.g. `payment` or `claim_claimable_balance`.
    pub kind: String,
    /// Moved amount, for operations that carry one.
    pub amount: Option<Amount>,
    pub tx_hash: TxHash,
    pub created_at: DateTime<Utc>,
}

/// Read-side ledger access.
pub trait LedgerQuery: Send + Sync {
    /// Fetch a claimable resource by id.
    ///
    /// Returns `LedgerError::NotFound` when the resource does not exist
    /// (never created, or already claimed).
    fn claimable_resource(&self, id: ResourceId) -> BoxFuture<'_, LedgerResult<ClaimableResource>>;

    /// Native balance the account can spend, after the minimum reserve.
    fn spendable_balance(&self, address: Address) -> BoxFuture<'_, LedgerResult<Amount>>;

    /// Claimable resources listing `address` as a claimant.
    fn claimable_for(&self, address: Address) -> BoxFuture<'_, LedgerResult<Vec<ClaimableResource>>>;

    /// Up to `limit` operations touching `address`, newest first.
    fn recent_operations(
        &self,
        address: Address,
        limit: usize,
    ) -> BoxFuture<'_, LedgerResult<Vec<OperationRecord>>>;
}

/// Write-side ledger access.
///
/// Both calls are single submissions: no retries happen below this trait.
pub trait LedgerSubmitter: Send + Sync {
    fn submit_claim(&self, submission: ClaimSubmission)
        -> BoxFuture<'_, Result<ClaimReceipt, SubmitError>>;

    fn submit_transfer(
        &self,
        submission: TransferSubmission,
    ) -> BoxFuture<'_, Result<TxHash, SubmitError>>;
}

/// Arc wrapper for LedgerQuery trait objects.
pub type DynLedgerQuery = Arc<dyn LedgerQuery>;

/// Arc wrapper for LedgerSubmitter trait objects.
pub type DynLedgerSubmitter = Arc<dyn LedgerSubmitter>;
