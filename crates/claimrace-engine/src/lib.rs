//! Time-triggered competitive claim orchestration.
//!
//! Key components:
//! - `SessionScheduler`: waits until shortly before the unlock instant
//! - `RaceOrchestrator`: fans out claim workers and the relay monitor
//! - `ClaimWorker`: repeated claim submissions with fee and backoff policies
//! - `RelayMonitor`: forwards freed funds to the destination
//! - `RaceCancellation`: first-success-wins cancellation latch
//! - `EventSink`: serialized progress stream to the observer

pub mod backoff;
pub mod cancel;
pub mod clock;
pub mod error;
pub mod event;
pub mod fee;
pub mod orchestrator;
pub mod relay;
pub mod scheduler;
pub mod session;
pub mod sink;
pub mod worker;

#[cfg(test)]
mod testing;

pub use backoff::{BackoffPolicy, CappedBackoff, ExponentialBackoff, LinearBackoff};
pub use cancel::RaceCancellation;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EngineError, EngineResult};
pub use event::{AttemptOutcome, AttemptRecord, EventKind, RaceEvent};
pub use fee::{
    FeeContext, FeePolicy, FixedFeePolicy, TieredFeePolicy, DEFAULT_COMPETITIVE_FEES,
    DEFAULT_DIRECT_FEE, DEFAULT_TRANSFER_FEE,
};
pub use orchestrator::{RaceOrchestrator, SessionReport};
pub use relay::{RelayMonitor, RelayOutcome};
pub use scheduler::SessionScheduler;
pub use session::{RaceConfig, RaceSession};
pub use sink::{DynEventSink, EventSink, JsonLinesSink, RecordedEvent, RecordingSink};
pub use worker::{ClaimWorker, WorkerOutcome};
