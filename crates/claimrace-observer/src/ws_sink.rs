//! Event sink over the observer WebSocket.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::Mutex;
use tracing::debug;

use claimrace_engine::{EventSink, RaceEvent};
use claimrace_ledger::BoxFuture;

/// Writes each event as one JSON text frame.
///
/// The write half is locked for the whole send, so frames from concurrent
/// actors never interleave. Once a send fails the observer is treated as
/// gone and later events are dropped.
pub struct WsEventSink {
    sender: Mutex<SplitSink<WebSocket, Message>>,
    closed: AtomicBool,
}

impl WsEventSink {
    pub fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sender: Mutex::new(sender),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send a close frame; errors are ignored.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut sender = self.sender.lock().await;
        if let Err(e) = sender.close().await {
            debug!(error = %e, "Observer close failed");
        }
    }
}

impl EventSink for WsEventSink {
    fn emit(&self, event: RaceEvent) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.is_closed() {
                return;
            }
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    debug!(error = %e, "Failed to serialize event");
                    return;
                }
            };

            let mut sender = self.sender.lock().await;
            if let Err(e) = sender.send(Message::Text(json.into())).await {
                debug!(error = %e, "Observer gone, dropping events");
                self.closed.store(true, Ordering::Release);
            }
        })
    }
}
