//! Wire types for the observer endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use claimrace_ledger::OperationRecord;

/// Initial message on the observer socket.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimRequest {
    pub seed_phrase: String,
    /// Empty or absent means no sponsor.
    #[serde(default)]
    pub sponsor_phrase: Option<String>,
    pub withdrawal_address: String,
    pub locked_balance_id: String,
    /// Expected claim amount; informational.
    #[serde(default)]
    pub amount: String,
}

impl ClaimRequest {
    /// Sponsor phrase if one was supplied.
    pub fn sponsor(&self) -> Option<&str> {
        self.sponsor_phrase
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Body of `POST /api/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub seed_phrase: String,
}

/// One locked resource in the account overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedBalanceView {
    pub id: String,
    pub amount: String,
    pub asset: String,
    /// Unlock instant for this wallet; absent when the predicate is unsupported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock_at: Option<DateTime<Utc>>,
}

/// One recent operation in the account overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    pub transaction_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<OperationRecord> for TransactionView {
    fn from(op: OperationRecord) -> Self {
        Self {
            id: op.id,
            kind: op.kind,
            amount: op.amount.map(|a| a.to_string()),
            transaction_hash: op.tx_hash.0,
            created_at: op.created_at,
        }
    }
}

/// Response of `POST /api/login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub wallet_address: String,
    pub available_balance: String,
    /// Most recent operations, newest first.
    pub transactions: Vec<TransactionView>,
    pub locked_balances: Vec<LockedBalanceView>,
}

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
