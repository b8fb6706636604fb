//! Time-triggered claim race orchestrator.
//!
//! Wires the pieces together:
//! - Ledger backend (sandbox ledger seeded from config)
//! - Race orchestrator with the configured tunables
//! - Observer server (WebSocket race stream, account API, metrics)
//! - One-shot races driven from the command line

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
