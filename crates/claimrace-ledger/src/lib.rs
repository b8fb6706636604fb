//! Ledger collaborator interfaces and adapters.
//!
//! The race engine never talks to the ledger directly. It consumes the narrow
//! traits defined here:
//! - [`LedgerQuery`]: resource lookups and reserve-adjusted balances
//! - [`LedgerSubmitter`]: claim and transfer submission
//! - [`KeyResolver`]: secret material to signing identity
//!
//! Adapters:
//! - [`SandboxLedger`]: in-memory ledger with single-claim semantics
//! - [`HorizonClient`]: Horizon REST queries and envelope submission

pub mod error;
pub mod horizon;
pub mod keys;
pub mod ledger;
pub mod result_codes;
pub mod sandbox;

pub use error::{FailureKind, LedgerError, LedgerResult, SubmitError};
pub use horizon::{EnvelopeSigner, HorizonClient, HorizonSubmitter};
pub use keys::{DynKeyResolver, KeyResolver, SandboxKeyResolver};
pub use ledger::{
    BoxFuture, ClaimReceipt, ClaimSubmission, DynLedgerQuery, DynLedgerSubmitter, LedgerQuery,
    LedgerSubmitter, OperationRecord, TransferSubmission,
};
pub use result_codes::classify_result_codes;
pub use sandbox::{SandboxConfig, SandboxLedger};
