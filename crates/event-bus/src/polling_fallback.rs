//! Polling fallback for event processing (spec §4.D poller loop)
//!
//! The broadcast path is best-effort: a stalled Redis or a handler that
//! throws marks the event `poll` instead of `broadcast`. This loop is
//! the safety net — it claims `poll`-mode events in batches and
//! re-delivers them through the bus's in-process subscriber fan-out,
//! guaranteeing zero event loss even during broadcast-path downtime.

use crate::bus::EventBus;
use shared::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Polling interval (spec §4.D default).
const POLL_INTERVAL_SECS: u64 = 60;

/// Safety cap on loop iterations before the process should be restarted.
const MAX_POLLING_ITERATIONS: u64 = 1_000_000;

pub struct PollingFallback {
    bus: Arc<EventBus>,
    last_poll_time: Arc<RwLock<Option<std::time::Instant>>>,
    events_recovered: Arc<RwLock<u64>>,
}

impl PollingFallback {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            last_poll_time: Arc::new(RwLock::new(None)),
            events_recovered: Arc::new(RwLock::new(0)),
        }
    }

    /// Run the polling loop indefinitely. Intended to be spawned as a
    /// separate Tokio task.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        info!(
            interval_secs = POLL_INTERVAL_SECS,
            "starting polling fallback loop"
        );

        let mut iteration_count = 0u64;

        loop {
            iteration_count += 1;
            if iteration_count > MAX_POLLING_ITERATIONS {
                error!(
                    iteration_count,
                    max_iterations = MAX_POLLING_ITERATIONS,
                    "polling fallback exceeded maximum iterations, exiting for restart"
                );
                return Err(shared::Error::internal(
                    "polling fallback exceeded maximum iterations",
                ));
            }

            *self.last_poll_time.write().await = Some(std::time::Instant::now());

            match self.bus.poll_once(None).await {
                Ok(count) if count > 0 => {
                    let mut recovered = self.events_recovered.write().await;
                    *recovered += count as u64;
                    warn!(
                        count,
                        total_recovered = *recovered,
                        "polling fallback recovered events"
                    );
                }
                Ok(_) => debug!("polling fallback: no pending events"),
                Err(e) => error!(error = %e.safe_message(), "polling fallback iteration failed"),
            }

            tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
        }
    }

    pub async fn events_recovered(&self) -> u64 {
        *self.events_recovered.read().await
    }

    pub async fn time_since_last_poll(&self) -> Option<Duration> {
        self.last_poll_time.read().await.map(|i| i.elapsed())
    }
}
