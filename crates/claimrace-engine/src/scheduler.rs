//! Session scheduler.
//!
//! Starts the race a fixed lead window before the unlock instant so the first
//! submissions land as close to the unlock as possible. A resource that is
//! already unlocked starts immediately. The wait is a single timer sleep.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::event::RaceEvent;
use crate::orchestrator::{RaceOrchestrator, SessionReport};
use crate::session::RaceSession;
use crate::sink::DynEventSink;

pub struct SessionScheduler<C: Clock = SystemClock> {
    clock: C,
    lead_window: Duration,
}

impl SessionScheduler<SystemClock> {
    pub fn new(lead_window: Duration) -> Self {
        Self::with_clock(SystemClock, lead_window)
    }
}

impl<C: Clock> SessionScheduler<C> {
    pub fn with_clock(clock: C, lead_window: Duration) -> Self {
        Self { clock, lead_window }
    }

    pub fn lead_window(&self) -> Duration {
        self.lead_window
    }

    /// `unlock_at − lead_window`, clamped to the earliest representable
    /// instant.
    pub fn start_time(&self, unlock_at: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.lead_window)
            .ok()
            .and_then(|lead| unlock_at.checked_sub_signed(lead))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Time left until the start instant; zero when it has passed.
    pub fn wait_duration(&self, unlock_at: DateTime<Utc>) -> Duration {
        (self.start_time(unlock_at) - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Sleep until the race should start, reporting the plan to the sink.
    ///
    /// Returns the time waited.
    pub async fn wait_for_start(&self, unlock_at: DateTime<Utc>, sink: &DynEventSink) -> Duration {
        let wait = self.wait_duration(unlock_at);
        if wait.is_zero() {
            info!(unlock_at = %unlock_at, "Resource already claimable, starting immediately");
            sink.emit(RaceEvent::info(
                "Resource already unlocked, starting claim race immediately",
            ))
            .await;
            return wait;
        }

        let start_at = self.start_time(unlock_at);
        info!(
            unlock_at = %unlock_at,
            start_at = %start_at,
            wait_ms = wait.as_millis() as u64,
            "Claim race scheduled"
        );
        sink.emit(RaceEvent::scheduled(format!(
            "Race will start {}s before unlock at {}",
            self.lead_window.as_secs(),
            start_at.format("%H:%M:%S")
        )))
        .await;
        sink.emit(RaceEvent::waiting(format!(
            "Waiting {} seconds until start...",
            wait.as_secs()
        )))
        .await;

        tokio::time::sleep(wait).await;
        wait
    }

    /// Wait for the start instant, then run the race to completion.
    pub async fn run(
        &self,
        orchestrator: &RaceOrchestrator,
        session: RaceSession,
        sink: DynEventSink,
    ) -> SessionReport {
        self.wait_for_start(session.unlock_at, &sink).await;
        orchestrator.start(session, sink).await
    }
}
