//! Core domain types for the claimrace claim orchestrator.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `Amount`, `Fee`: Precision-safe ledger amounts and per-operation fees
//! - `Address`, `ResourceId`, `TxHash`: Ledger identifiers
//! - `ClaimableResource`, `Claimant`, `RawPredicate`: Ledger records as fetched
//! - `TimeLockPredicate`: Resolved unlock condition of a claimant
//! - `Signer`, `SecretPhrase`: Resolved signing identities

pub mod amount;
pub mod error;
pub mod predicate;
pub mod resource;
pub mod signer;
pub mod types;

pub use amount::{Amount, Fee, STROOPS_PER_UNIT};
pub use error::{CoreError, Result};
pub use predicate::{resolve_unlock_for, TimeLockPredicate};
pub use resource::{ClaimableResource, Claimant, RawPredicate};
pub use signer::{SecretPhrase, Signer};
pub use types::{Address, ResourceId, TxHash};
