//! claimrace-observer - live observer endpoint for claim races.
//!
//! ```text
//! GET  /ws/withdraw  → WebSocket: one claim request in, race events out
//! POST /api/login    → account overview (address, balance, locked resources)
//! GET  /metrics      → Prometheus text format
//! GET  /health       → liveness
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let service = Arc::new(ClaimService::new(query, keys, orchestrator));
//! run_server(service, ObserverConfig::default(), shutdown).await?;
//! ```

mod config;
mod error;
mod server;
mod service;
mod types;
mod ws_sink;

pub use config::ObserverConfig;
pub use error::{ObserverError, ObserverResult};
pub use server::{create_router, run_server, serve, ConnectionLimiter, ObserverState};
pub use service::ClaimService;
pub use types::{ClaimRequest, LockedBalanceView, LoginRequest, LoginResponse};
pub use ws_sink::WsEventSink;
