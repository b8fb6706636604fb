//! Engine error types.

use thiserror::Error;

use claimrace_core::CoreError;
use claimrace_ledger::LedgerError;

/// Errors that prevent a race from starting.
///
/// Nothing raised while racing surfaces here: attempt and relay failures are
/// reported as events.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid race configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type EngineResult<T> = Result<T, EngineError>;
