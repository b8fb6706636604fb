//! Ledger error types.

use std::fmt;

use thiserror::Error;

/// Errors from ledger queries and key resolution.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Core error: {0}")]
    Core(#[from] claimrace_core::CoreError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Classification of a rejected submission.
///
/// Used for logs and metrics only; the claim workers retry every kind the
/// same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The resource no longer exists (someone else claimed it).
    AlreadyClaimed,
    /// Claimant or predicate does not allow claiming yet.
    NotYetClaimable,
    /// Fee bid below the network's current minimum.
    InsufficientFee,
    /// Sequence number conflict with a concurrent submission.
    BadSequence,
    /// Source account cannot cover amount, fee or reserve.
    InsufficientBalance,
    /// Missing or wrong signatures.
    Unauthorized,
    /// Request never reached the ledger or the response was lost.
    Transport,
    /// Any other rejection.
    Rejected,
}

impl FailureKind {
    /// Stable label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyClaimed => "already_claimed",
            Self::NotYetClaimable => "not_yet_claimable",
            Self::InsufficientFee => "insufficient_fee",
            Self::BadSequence => "bad_sequence",
            Self::InsufficientBalance => "insufficient_balance",
            Self::Unauthorized => "unauthorized",
            Self::Transport => "transport",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected claim or transfer submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct SubmitError {
    pub kind: FailureKind,
    pub reason: String,
}

impl SubmitError {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, reason)
    }
}
