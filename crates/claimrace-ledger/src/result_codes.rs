//! Classification of ledger result codes.
//!
//! A rejected transaction carries a transaction-level code and one code per
//! operation. Operation codes are more specific and win when present.

use crate::error::FailureKind;

/// Classify a rejection from its transaction and operation result codes.
pub fn classify_result_codes(transaction: Option<&str>, operations: &[String]) -> FailureKind {
    for op in operations {
        if let Some(kind) = classify_operation(op) {
            return kind;
        }
    }

    match transaction {
        Some("tx_bad_seq") => FailureKind::BadSequence,
        Some("tx_insufficient_fee") => FailureKind::InsufficientFee,
        Some("tx_insufficient_balance") => FailureKind::InsufficientBalance,
        Some("tx_bad_auth") | Some("tx_bad_auth_extra") => FailureKind::Unauthorized,
        Some("tx_too_early") => FailureKind::NotYetClaimable,
        _ => FailureKind::Rejected,
    }
}

fn classify_operation(code: &str) -> Option<FailureKind> {
    match code {
        "op_success" => None,
        "op_does_not_exist" => Some(FailureKind::AlreadyClaimed),
        "op_cannot_claim" => Some(FailureKind::NotYetClaimable),
        "op_underfunded" | "op_low_reserve" | "op_line_full" => {
            Some(FailureKind::InsufficientBalance)
        }
        "op_bad_auth" | "op_no_source_account" => Some(FailureKind::Unauthorized),
        _ => Some(FailureKind::Rejected),
    }
}
