//! Application configuration.

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use claimrace_core::{Amount, Fee};
use claimrace_engine::{
    RaceConfig, DEFAULT_COMPETITIVE_FEES, DEFAULT_DIRECT_FEE, DEFAULT_TRANSFER_FEE,
};
use claimrace_ledger::SandboxConfig;
use claimrace_observer::ObserverConfig;

use crate::error::{AppError, AppResult};

/// Ledger network the process is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

// ============================================================================
// Race
// ============================================================================

/// Race tunables as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSection {
    /// Concurrent claim workers per session.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Attempt budget per worker.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Seconds before the unlock instant at which the race starts.
    #[serde(default = "default_lead_window_secs")]
    pub lead_window_secs: u64,
    /// Backoff after the first failed attempt (ms).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Backoff increment per attempt (ms).
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,
    /// Sponsored-claim fee tiers (stroops).
    #[serde(default = "default_competitive_fees")]
    pub competitive_fees: Vec<u64>,
    /// Unsponsored claim fee (stroops).
    #[serde(default = "default_direct_fee")]
    pub direct_fee: u64,
    /// Relay transfer fee (stroops).
    #[serde(default = "default_transfer_fee")]
    pub transfer_fee: u64,
    /// Relay balance polling interval (ms).
    #[serde(default = "default_relay_poll_interval_ms")]
    pub relay_poll_interval_ms: u64,
    /// Relay monitor deadline (seconds).
    #[serde(default = "default_relay_timeout_secs")]
    pub relay_timeout_secs: u64,
}

fn default_workers() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    200
}

fn default_lead_window_secs() -> u64 {
    5
}

fn default_backoff_base_ms() -> u64 {
    50
}

fn default_backoff_step_ms() -> u64 {
    10
}

fn default_competitive_fees() -> Vec<u64> {
    DEFAULT_COMPETITIVE_FEES.to_vec()
}

fn default_direct_fee() -> u64 {
    DEFAULT_DIRECT_FEE
}

fn default_transfer_fee() -> u64 {
    DEFAULT_TRANSFER_FEE
}

fn default_relay_poll_interval_ms() -> u64 {
    10
}

fn default_relay_timeout_secs() -> u64 {
    30
}

impl Default for RaceSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            lead_window_secs: default_lead_window_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_step_ms: default_backoff_step_ms(),
            competitive_fees: default_competitive_fees(),
            direct_fee: default_direct_fee(),
            transfer_fee: default_transfer_fee(),
            relay_poll_interval_ms: default_relay_poll_interval_ms(),
            relay_timeout_secs: default_relay_timeout_secs(),
        }
    }
}

impl RaceSection {
    pub fn to_race_config(&self) -> RaceConfig {
        RaceConfig {
            workers: self.workers,
            max_attempts: self.max_attempts,
            lead_window: Duration::from_secs(self.lead_window_secs),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_step: Duration::from_millis(self.backoff_step_ms),
            competitive_fees: self.competitive_fees.iter().copied().map(Fee).collect(),
            direct_fee: Fee(self.direct_fee),
            transfer_fee: Fee(self.transfer_fee),
            relay_poll_interval: Duration::from_millis(self.relay_poll_interval_ms),
            relay_timeout: Duration::from_secs(self.relay_timeout_secs),
        }
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// Ledger connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSection {
    #[serde(default)]
    pub network: Network,
    /// Horizon REST endpoint used by `inspect`.
    #[serde(default)]
    pub horizon_url: Option<String>,
}

// ============================================================================
// Sandbox
// ============================================================================

/// Account funded at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxAccount {
    pub phrase: String,
    pub balance: Decimal,
}

/// Claimable resource created at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxResource {
    pub id: String,
    pub amount: Decimal,
    #[serde(default = "default_asset")]
    pub asset: String,
    /// Phrase of the wallet allowed to claim.
    pub claimant_phrase: String,
    /// Unlock offset from startup; zero or negative means already unlocked.
    #[serde(default)]
    pub unlock_in_secs: i64,
}

fn default_asset() -> String {
    "native".to_string()
}

/// In-memory ledger seed and rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSection {
    #[serde(default = "default_base_reserve")]
    pub base_reserve: Decimal,
    #[serde(default = "default_fee_headroom")]
    pub fee_headroom: Decimal,
    /// Artificial latency per ledger call (ms).
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub accounts: Vec<SandboxAccount>,
    #[serde(default)]
    pub resources: Vec<SandboxResource>,
}

fn default_base_reserve() -> Decimal {
    Decimal::new(49, 2)
}

fn default_fee_headroom() -> Decimal {
    Decimal::new(5, 1)
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            base_reserve: default_base_reserve(),
            fee_headroom: default_fee_headroom(),
            latency_ms: 0,
            accounts: Vec::new(),
            resources: Vec::new(),
        }
    }
}

impl SandboxSection {
    pub fn ledger_config(&self) -> SandboxConfig {
        SandboxConfig {
            base_reserve: Amount::new(self.base_reserve),
            fee_headroom: Amount::new(self.fee_headroom),
            latency: Duration::from_millis(self.latency_ms),
        }
    }
}

// ============================================================================
// AppConfig
// ============================================================================

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ObserverConfig,
    #[serde(default)]
    pub race: RaceSection,
    #[serde(default)]
    pub ledger: LedgerSection,
    #[serde(default)]
    pub sandbox: SandboxSection,
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file is missing.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML content.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.race
            .to_race_config()
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if self.server.max_connections == 0 {
            return Err(AppError::Config(
                "server.max_connections must be > 0".to_string(),
            ));
        }
        if self.sandbox.base_reserve.is_sign_negative() || self.sandbox.fee_headroom.is_sign_negative()
        {
            return Err(AppError::Config(
                "sandbox reserve and headroom must not be negative".to_string(),
            ));
        }
        for resource in &self.sandbox.resources {
            if resource.id.trim().is_empty() {
                return Err(AppError::Config("sandbox resource id is empty".to_string()));
            }
            if resource.amount <= Decimal::ZERO {
                return Err(AppError::Config(format!(
                    "sandbox resource {} must have a positive amount",
                    resource.id
                )));
            }
        }
        Ok(())
    }
}
