//! In-memory sandbox ledger.
//!
//! Implements both collaborator traits with the ledger rules the race depends
//! on:
//! - A resource can be claimed exactly once (removal is atomic)
//! - Claims before the unlock instant are rejected
//! - Spendable balance is reserve-adjusted
//! - Fees are charged to the fee payer
//! - Accepted claims and transfers are kept in per-account history
//!
//! Used by the sandbox mode of the binary and by integration tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use claimrace_core::{
    Address, Amount, ClaimableResource, ResourceId, TimeLockPredicate, TxHash,
};

use crate::error::{FailureKind, LedgerError, LedgerResult, SubmitError};
use crate::ledger::{
    BoxFuture, ClaimReceipt, ClaimSubmission, LedgerQuery, LedgerSubmitter, OperationRecord,
    TransferSubmission,
};

/// Sandbox ledger parameters.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Reserve held per base entry and per subentry.
    pub base_reserve: Amount,
    /// Amount kept back from the spendable balance to pay a transfer fee.
    pub fee_headroom: Amount,
    /// Artificial latency added to every call.
    pub latency: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            base_reserve: Amount::new(Decimal::new(49, 2)),
            fee_headroom: Amount::new(Decimal::new(5, 1)),
            latency: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SandboxAccount {
    native: Amount,
    subentries: u32,
}

/// In-memory ledger.
#[derive(Debug)]
pub struct SandboxLedger {
    config: SandboxConfig,
    accounts: DashMap<Address, SandboxAccount>,
    resources: DashMap<ResourceId, ClaimableResource>,
    /// Accepted operations per involved account, oldest first.
    history: DashMap<Address, Vec<OperationRecord>>,
    tx_counter: AtomicU64,
}

impl SandboxLedger {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            accounts: DashMap::new(),
            resources: DashMap::new(),
            history: DashMap::new(),
            tx_counter: AtomicU64::new(0),
        }
    }

    /// Credit native funds, creating the account if needed.
    pub fn fund(&self, address: &Address, amount: Amount) {
        self.accounts
            .entry(address.clone())
            .and_modify(|a| a.native = a.native + amount)
            .or_insert(SandboxAccount {
                native: amount,
                subentries: 0,
            });
    }

    /// Register a claimable resource.
    pub fn create_resource(&self, resource: ClaimableResource) {
        info!(
            resource_id = %resource.id,
            amount = %resource.amount,
            claimants = resource.claimants.len(),
            "Sandbox resource created"
        );
        self.resources.insert(resource.id.clone(), resource);
    }

    /// Total native balance of an account.
    pub fn balance_of(&self, address: &Address) -> Option<Amount> {
        self.accounts.get(address).map(|a| a.native)
    }

    pub fn resource_exists(&self, id: &ResourceId) -> bool {
        self.resources.contains_key(id)
    }

    /// Number of accepted transactions.
    pub fn accepted_transactions(&self) -> u64 {
        self.tx_counter.load(Ordering::SeqCst)
    }

    fn minimum_balance(&self, account: &SandboxAccount) -> Amount {
        Amount::new(self.config.base_reserve.inner() * Decimal::from(2 + account.subentries))
    }

    /// Allocate the next transaction number and its hash.
    fn next_tx(&self) -> (u64, TxHash) {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let digest = Sha256::digest(format!("sandbox-tx-{n}").as_bytes());
        (n, TxHash(hex::encode(digest)))
    }

    /// Append one operation to the history of every party.
    fn record(&self, tx: u64, hash: &TxHash, kind: &str, amount: Amount, parties: &[&Address]) {
        let record = OperationRecord {
            id: tx.to_string(),
            kind: kind.to_string(),
            amount: Some(amount),
            tx_hash: hash.clone(),
            created_at: Utc::now(),
        };
        for (i, party) in parties.iter().enumerate() {
            if parties[..i].contains(party) {
                continue;
            }
            self.history
                .entry((*party).clone())
                .or_default()
                .push(record.clone());
        }
    }

    fn can_claim(resource: &ClaimableResource, claimant: &Address, now: DateTime<Utc>) -> bool {
        resource
            .claimants_for(claimant)
            .filter_map(|c| TimeLockPredicate::from_raw(&c.predicate).unlock_at())
            .any(|unlock| now >= unlock)
    }

    /// Deduct `amount`, keeping the minimum balance intact.
    fn debit(&self, address: &Address, amount: Amount) -> Result<(), SubmitError> {
        let mut account = self.accounts.get_mut(address).ok_or_else(|| {
            SubmitError::new(FailureKind::Unauthorized, "tx_no_source_account")
        })?;
        let available = account.native.saturating_sub(self.minimum_balance(&account));
        if available < amount {
            return Err(SubmitError::new(
                FailureKind::InsufficientBalance,
                "tx_insufficient_balance",
            ));
        }
        account.native = account.native - amount;
        Ok(())
    }

    fn claim_now(&self, submission: &ClaimSubmission) -> Result<ClaimReceipt, SubmitError> {
        let fee = submission.fee.as_amount();
        let payer = submission.fee_payer.address();
        let claimant = submission.claimant.address();

        // Fee is charged even when the claim operation fails, like the ledger.
        self.debit(payer, fee)?;

        let now = Utc::now();
        let removed = self
            .resources
            .remove_if(&submission.resource_id, |_, r| Self::can_claim(r, claimant, now));

        match removed {
            Some((_, resource)) => {
                self.fund(claimant, resource.amount);
                let (tx, hash) = self.next_tx();
                self.record(
                    tx,
                    &hash,
                    "claim_claimable_balance",
                    resource.amount,
                    &[claimant, payer],
                );
                info!(
                    resource_id = %submission.resource_id,
                    claimant = %claimant,
                    hash = %hash,
                    "Sandbox claim accepted"
                );
                Ok(ClaimReceipt {
                    hash,
                    amount: Some(resource.amount),
                })
            }
            None if self.resources.contains_key(&submission.resource_id) => Err(
                SubmitError::new(FailureKind::NotYetClaimable, "op_cannot_claim"),
            ),
            None => Err(SubmitError::new(
                FailureKind::AlreadyClaimed,
                "op_does_not_exist",
            )),
        }
    }

    fn transfer_now(&self, submission: &TransferSubmission) -> Result<TxHash, SubmitError> {
        if !submission.amount.is_positive() {
            return Err(SubmitError::new(FailureKind::Rejected, "op_malformed"));
        }
        let total = submission.amount + submission.fee.as_amount();
        self.debit(submission.signer.address(), total)
            .map_err(|e| match e.kind {
                FailureKind::InsufficientBalance => {
                    SubmitError::new(FailureKind::InsufficientBalance, "op_underfunded")
                }
                _ => e,
            })?;
        self.fund(&submission.destination, submission.amount);
        let (tx, hash) = self.next_tx();
        self.record(
            tx,
            &hash,
            "payment",
            submission.amount,
            &[submission.signer.address(), &submission.destination],
        );
        debug!(
            from = %submission.signer.address(),
            to = %submission.destination,
            amount = %submission.amount,
            "Sandbox transfer accepted"
        );
        Ok(hash)
    }

    async fn simulate_latency(&self) {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
    }
}

impl Default for SandboxLedger {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

impl LedgerQuery for SandboxLedger {
    fn claimable_resource(&self, id: ResourceId) -> BoxFuture<'_, LedgerResult<ClaimableResource>> {
        Box::pin(async move {
            self.simulate_latency().await;
            self.resources
                .get(&id)
                .map(|r| r.clone())
                .ok_or_else(|| LedgerError::NotFound(format!("claimable resource {id}")))
        })
    }

    fn spendable_balance(&self, address: Address) -> BoxFuture<'_, LedgerResult<Amount>> {
        Box::pin(async move {
            self.simulate_latency().await;
            let account = self
                .accounts
                .get(&address)
                .map(|a| *a)
                .ok_or_else(|| LedgerError::NotFound(format!("account {address}")))?;
            Ok(account
                .native
                .saturating_sub(self.minimum_balance(&account))
                .saturating_sub(self.config.fee_headroom))
        })
    }

    fn claimable_for(&self, address: Address) -> BoxFuture<'_, LedgerResult<Vec<ClaimableResource>>> {
        Box::pin(async move {
            self.simulate_latency().await;
            Ok(self
                .resources
                .iter()
                .filter(|r| r.claimant_for(&address).is_some())
                .map(|r| r.clone())
                .collect())
        })
    }

    fn recent_operations(
        &self,
        address: Address,
        limit: usize,
    ) -> BoxFuture<'_, LedgerResult<Vec<OperationRecord>>> {
        Box::pin(async move {
            self.simulate_latency().await;
            if !self.accounts.contains_key(&address) {
                return Err(LedgerError::NotFound(format!("account {address}")));
            }
            Ok(self
                .history
                .get(&address)
                .map(|ops| ops.iter().rev().take(limit).cloned().collect())
                .unwrap_or_default())
        })
    }
}

impl LedgerSubmitter for SandboxLedger {
    fn submit_claim(
        &self,
        submission: ClaimSubmission,
    ) -> BoxFuture<'_, Result<ClaimReceipt, SubmitError>> {
        Box::pin(async move {
            self.simulate_latency().await;
            self.claim_now(&submission)
        })
    }

    fn submit_transfer(
        &self,
        submission: TransferSubmission,
    ) -> BoxFuture<'_, Result<TxHash, SubmitError>> {
        Box::pin(async move {
            self.simulate_latency().await;
            self.transfer_now(&submission)
        })
    }
}
