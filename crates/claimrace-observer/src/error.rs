//! Observer error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

use claimrace_core::CoreError;
use claimrace_engine::EngineError;
use claimrace_ledger::LedgerError;

use crate::types::ErrorBody;

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid {role} seed phrase")]
    InvalidKey { role: &'static str },

    #[error("Error getting locked balance: {0}")]
    ResourceLookup(LedgerError),

    #[error("Cannot determine unlock time from balance predicate: {0}")]
    UnlockUnresolved(CoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ObserverError {
    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidKey { .. } => "invalid_key",
            Self::ResourceLookup(_) => "resource_lookup",
            Self::UnlockUnresolved(_) => "unlock_unresolved",
            Self::Ledger(_) => "ledger",
            Self::Engine(_) => "engine",
            Self::Io(_) => "io",
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Ledger(_) | Self::Io(_) | Self::Engine(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(ErrorBody {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub type ObserverResult<T> = Result<T, ObserverError>;
