//! Scripted ledger fakes for engine tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use claimrace_core::{
    Address, Amount, ClaimableResource, Fee, ResourceId, SecretPhrase, Signer, TxHash,
};
use claimrace_ledger::{
    BoxFuture, ClaimReceipt, ClaimSubmission, FailureKind, LedgerError, LedgerQuery,
    LedgerResult, LedgerSubmitter, OperationRecord, SubmitError, TransferSubmission,
};

use crate::session::RaceSession;

/// Ledger whose claim succeeds only on one scripted call.
///
/// Every other claim fails with "already claimed". Once the claim succeeds,
/// the spendable balance becomes `payout`.
pub struct ScriptedLedger {
    /// 1-based global call index that succeeds.
    succeed_on_call: Option<usize>,
    claim_calls: AtomicUsize,
    claimed: AtomicBool,
    payout: Amount,
    fees: Mutex<Vec<Fee>>,
    fee_payers: Mutex<Vec<Address>>,
    transfers: Mutex<Vec<TransferSubmission>>,
    transfer_failures_left: AtomicUsize,
    balance_queries: AtomicUsize,
}

impl ScriptedLedger {
    pub fn new(succeed_on_call: Option<usize>) -> Self {
        Self {
            succeed_on_call,
            claim_calls: AtomicUsize::new(0),
            claimed: AtomicBool::new(false),
            payout: Amount::from_stroops(1_000_000_000),
            fees: Mutex::new(Vec::new()),
            fee_payers: Mutex::new(Vec::new()),
            transfers: Mutex::new(Vec::new()),
            transfer_failures_left: AtomicUsize::new(0),
            balance_queries: AtomicUsize::new(0),
        }
    }

    /// Balance is already spendable before any claim.
    pub fn already_funded(self) -> Self {
        self.claimed.store(true, Ordering::SeqCst);
        self
    }

    /// Fail the first `n` transfers.
    pub fn failing_transfers(self, n: usize) -> Self {
        self.transfer_failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn claim_calls(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }

    pub fn balance_queries(&self) -> usize {
        self.balance_queries.load(Ordering::SeqCst)
    }

    pub fn fees(&self) -> Vec<Fee> {
        self.fees.lock().clone()
    }

    pub fn fee_payers(&self) -> Vec<Address> {
        self.fee_payers.lock().clone()
    }

    pub fn transfers(&self) -> Vec<TransferSubmission> {
        self.transfers.lock().clone()
    }

    pub fn payout(&self) -> Amount {
        self.payout
    }
}

impl LedgerSubmitter for ScriptedLedger {
    fn submit_claim(
        &self,
        submission: ClaimSubmission,
    ) -> BoxFuture<'_, Result<ClaimReceipt, SubmitError>> {
        Box::pin(async move {
            let call = self.claim_calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.fees.lock().push(submission.fee);
            self.fee_payers
                .lock()
                .push(submission.fee_payer.address().clone());

            if self.succeed_on_call == Some(call) {
                self.claimed.store(true, Ordering::SeqCst);
                return Ok(ClaimReceipt {
                    hash: TxHash(format!("claim-{call}")),
                    amount: Some(self.payout),
                });
            }
            Err(SubmitError::new(
                FailureKind::AlreadyClaimed,
                "op_does_not_exist",
            ))
        })
    }

    fn submit_transfer(
        &self,
        submission: TransferSubmission,
    ) -> BoxFuture<'_, Result<TxHash, SubmitError>> {
        Box::pin(async move {
            let failing = self
                .transfer_failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(SubmitError::new(FailureKind::BadSequence, "tx_bad_seq"));
            }
            self.transfers.lock().push(submission);
            Ok(TxHash("transfer-1".to_string()))
        })
    }
}

impl LedgerQuery for ScriptedLedger {
    fn claimable_resource(&self, id: ResourceId) -> BoxFuture<'_, LedgerResult<ClaimableResource>> {
        Box::pin(async move { Err(LedgerError::NotFound(id.to_string())) })
    }

    fn spendable_balance(&self, _address: Address) -> BoxFuture<'_, LedgerResult<Amount>> {
        Box::pin(async move {
            self.balance_queries.fetch_add(1, Ordering::SeqCst);
            if self.claimed.load(Ordering::SeqCst) {
                return Ok(self.payout);
            }
            Ok(Amount::ZERO)
        })
    }

    fn claimable_for(&self, _address: Address) -> BoxFuture<'_, LedgerResult<Vec<ClaimableResource>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn recent_operations(
        &self,
        _address: Address,
        _limit: usize,
    ) -> BoxFuture<'_, LedgerResult<Vec<OperationRecord>>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

pub fn signer(name: &str) -> Signer {
    Signer::new(Address::new(name), SecretPhrase::new(format!("{name} secret")))
}

pub fn session(sponsored: bool, unlock_at: DateTime<Utc>) -> Arc<RaceSession> {
    Arc::new(RaceSession {
        primary: signer("GMAIN"),
        sponsor: sponsored.then(|| signer("GSPONSOR")),
        destination: Address::new("GDEST"),
        amount_hint: Amount::from_stroops(1_000_000_000),
        resource_id: ResourceId::new("00c0ffee"),
        unlock_at,
    })
}
