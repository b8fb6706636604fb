//! Progress events streamed to the observer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use claimrace_core::{Amount, TxHash};
use claimrace_ledger::FailureKind;

/// Event kind, serialized as the `action` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Info,
    Attempt,
    Success,
    Error,
    Scheduled,
    Waiting,
    /// Handshake: first event on a new observer connection.
    ServerTime,
    /// Handshake: the unlock instant has been resolved.
    UnlockTimeFound,
}

/// One observer-facing event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceEvent {
    pub action: EventKind,
    pub message: String,
    pub success: bool,
    /// Local send time, `HH:MM:SS`.
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_time: Option<String>,
    /// Local send time in Unix milliseconds.
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl RaceEvent {
    pub fn new(action: EventKind, message: impl Into<String>, success: bool) -> Self {
        let now = Utc::now();
        Self {
            action,
            message: message.into(),
            success,
            time: now.format("%H:%M:%S").to_string(),
            server_time: None,
            timestamp_ms: now.timestamp_millis(),
            attempt_number: None,
            worker_id: None,
            amount: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(EventKind::Info, message, true)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, message, false)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(EventKind::Success, message, true)
    }

    pub fn scheduled(message: impl Into<String>) -> Self {
        Self::new(EventKind::Scheduled, message, true)
    }

    pub fn waiting(message: impl Into<String>) -> Self {
        Self::new(EventKind::Waiting, message, true)
    }

    /// Handshake event carrying the server's current time.
    pub fn server_time(now: DateTime<Utc>) -> Self {
        let mut event = Self::new(EventKind::ServerTime, "Bot initialized", true);
        event.server_time = Some(now.format("%H:%M:%S").to_string());
        event
    }

    pub fn unlock_time_found(unlock_at: DateTime<Utc>) -> Self {
        Self::new(
            EventKind::UnlockTimeFound,
            format!("Unlock time found: {}", unlock_at.to_rfc3339()),
            true,
        )
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount.to_f64());
        self
    }
}

/// Result of one claim submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success {
        hash: TxHash,
        amount: Option<Amount>,
    },
    Failure {
        kind: FailureKind,
        reason: String,
    },
}

/// One claim attempt as reported by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub worker_id: usize,
    pub attempt: u32,
    pub at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

impl AttemptRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success { .. })
    }
}

impl From<&AttemptRecord> for RaceEvent {
    fn from(record: &AttemptRecord) -> Self {
        let (message, success, amount) = match &record.outcome {
            AttemptOutcome::Success { hash, amount } => (
                format!(
                    "W{}: attempt {} succeeded, hash {}",
                    record.worker_id, record.attempt, hash.0
                ),
                true,
                *amount,
            ),
            AttemptOutcome::Failure { reason, .. } => (
                format!(
                    "W{}: attempt {} failed: {}",
                    record.worker_id, record.attempt, reason
                ),
                false,
                None,
            ),
        };

        let mut event = RaceEvent::new(EventKind::Attempt, message, success);
        event.time = record.at.format("%H:%M:%S").to_string();
        event.timestamp_ms = record.at.timestamp_millis();
        event.attempt_number = Some(record.attempt);
        event.worker_id = Some(record.worker_id);
        event.amount = amount.map(|a| a.to_f64());
        event
    }
}
