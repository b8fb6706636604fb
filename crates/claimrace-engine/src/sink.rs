//! Event sinks.
//!
//! One sink instance is shared by every actor of a session. Each `emit` is a
//! single serialized write; concurrent emits never interleave.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::debug;

use claimrace_ledger::BoxFuture;

use crate::event::{EventKind, RaceEvent};

/// Destination for race events.
///
/// Write failures are swallowed: the stream is best-effort telemetry.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RaceEvent) -> BoxFuture<'_, ()>;
}

/// Arc wrapper for EventSink trait objects.
pub type DynEventSink = Arc<dyn EventSink>;

// ============================================================================
// JsonLinesSink
// ============================================================================

/// Writes each event as one JSON line to an async writer.
pub struct JsonLinesSink<W> {
    writer: tokio::sync::Mutex<W>,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> EventSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn emit(&self, event: RaceEvent) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut line = match serde_json::to_vec(&event) {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(error = %e, "Failed to serialize event");
                    return;
                }
            };
            line.push(b'\n');

            // Held across the whole write so records never interleave.
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.write_all(&line).await {
                debug!(error = %e, "Event write failed");
                return;
            }
            if let Err(e) = writer.flush().await {
                debug!(error = %e, "Event flush failed");
            }
        })
    }
}

// ============================================================================
// RecordingSink
// ============================================================================

/// An event with the (tokio) instant it was emitted.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub event: RaceEvent,
    pub at: Instant,
}

/// In-memory sink for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events in emission order.
    pub fn recorded(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    pub fn events(&self) -> Vec<RaceEvent> {
        self.events.lock().iter().map(|r| r.event.clone()).collect()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<RaceEvent> {
        self.events
            .lock()
            .iter()
            .filter(|r| r.event.action == kind)
            .map(|r| r.event.clone())
            .collect()
    }

    /// Attempt events reported by one worker.
    pub fn attempts_of(&self, worker_id: usize) -> Vec<RaceEvent> {
        self.of_kind(EventKind::Attempt)
            .into_iter()
            .filter(|e| e.worker_id == Some(worker_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: RaceEvent) -> BoxFuture<'_, ()> {
        self.events.lock().push(RecordedEvent {
            event,
            at: Instant::now(),
        });
        Box::pin(async {})
    }
}
