//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] claimrace_core::CoreError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] claimrace_ledger::LedgerError),

    #[error("Engine error: {0}")]
    Engine(#[from] claimrace_engine::EngineError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] claimrace_telemetry::TelemetryError),

    #[error("Observer error: {0}")]
    Observer(#[from] claimrace_observer::ObserverError),

    #[error("Claim session rejected")]
    SessionRejected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
