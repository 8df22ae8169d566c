//! Generic fault-isolation circuit breaker (spec §4.A)
//!
//! Shared by the event bus (broadcast fan-out) and the action executor
//! (outbound dispatch): a process-local, in-memory three-state breaker
//! wrapping an arbitrary fallible async call in a call-timeout and
//! tripping on *retryable* failures only. 4xx/validation failures never
//! count against the threshold — they will not be fixed by waiting.
//!
//! # State machine
//!
//! ```text
//! closed --(failure_count >= failure_threshold)--> open
//! open --(now >= next_attempt_time)--> half_open (on next call)
//! half_open --(consecutive_successes >= success_threshold)--> closed
//! half_open --(any failure)--> open
//! ```

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Circuit breaker states (spec §3 `CircuitBreaker` entity).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive retryable failures before tripping open.
    pub failure_threshold: u32,
    /// Consecutive successes in half-open before closing.
    pub success_threshold: u32,
    /// Per-call timeout; expiry is always counted as a retryable failure.
    pub call_timeout: std::time::Duration,
    /// Time to wait in `open` before allowing a half-open probe.
    pub reset_timeout: std::time::Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            call_timeout: std::time::Duration::from_secs(10),
            reset_timeout: std::time::Duration::from_secs(60),
        }
    }
}

struct CircuitBreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u64,
    consecutive_successes: u32,
    last_state_change: DateTime<Utc>,
    next_attempt_time: Option<DateTime<Utc>>,
    total_requests: u64,
}

impl CircuitBreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            consecutive_successes: 0,
            last_state_change: Utc::now(),
            next_attempt_time: None,
            total_requests: 0,
        }
    }
}

/// A process-local, named circuit breaker.
///
/// Cloning shares the same underlying state (cheap `Arc` clone) — callers
/// that need one breaker per downstream target should keep a map of
/// named instances rather than cloning a single one for every target.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<CircuitBreakerState>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Arc::new(Mutex::new(CircuitBreakerState::new())),
        }
    }

    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Current state, for metrics/health reporting.
    pub async fn state(&self) -> CircuitState {
        self.state.lock().await.state
    }

    /// Run `f` through the breaker: rejected immediately with
    /// `Error::CircuitOpen` while open, otherwise wrapped in
    /// `call_timeout` and classified on return.
    pub async fn execute<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.call_allowed().await {
            let retry_after_secs = self.retry_after_secs().await;
            return Err(Error::CircuitOpen { retry_after_secs });
        }

        match tokio::time::timeout(self.config.call_timeout, f()).await {
            Ok(Ok(value)) => {
                self.record_success().await;
                Ok(value)
            }
            Ok(Err(e)) => {
                if e.is_retryable() {
                    self.record_failure().await;
                } else {
                    debug!(
                        breaker = %self.name,
                        error = %e.safe_message(),
                        "non-retryable failure, not counted against breaker"
                    );
                }
                Err(e)
            }
            Err(_) => {
                self.record_failure().await;
                Err(Error::Timeout(self.config.call_timeout.as_millis() as u64))
            }
        }
    }

    async fn retry_after_secs(&self) -> i64 {
        let state = self.state.lock().await;
        match state.next_attempt_time {
            Some(t) => (t - Utc::now()).num_seconds().max(0),
            None => 0,
        }
    }

    async fn call_allowed(&self) -> bool {
        let mut state = self.state.lock().await;
        state.total_requests += 1;

        match state.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let now = Utc::now();
                if state.next_attempt_time.is_some_and(|t| now >= t) {
                    info!(breaker = %self.name, "circuit breaker probing half_open");
                    state.state = CircuitState::HalfOpen;
                    state.last_state_change = now;
                    state.consecutive_successes = 0;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    async fn record_success(&self) {
        let mut state = self.state.lock().await;
        state.success_count += 1;

        match state.state {
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                state.consecutive_successes += 1;
                if state.consecutive_successes >= self.config.success_threshold {
                    info!(breaker = %self.name, "circuit breaker closing (recovery confirmed)");
                    state.state = CircuitState::Closed;
                    state.failure_count = 0;
                    state.consecutive_successes = 0;
                    state.next_attempt_time = None;
                    state.last_state_change = Utc::now();
                }
            }
            CircuitState::Open => {
                warn!(breaker = %self.name, "success recorded while open (unexpected)");
            }
        }
    }

    async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        match state.state {
            CircuitState::Closed => {
                state.failure_count += 1;
                if state.failure_count >= self.config.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failure_count = state.failure_count,
                        "circuit breaker tripping open"
                    );
                    state.state = CircuitState::Open;
                    state.next_attempt_time = Some(now + self.config.reset_timeout);
                    state.last_state_change = now;
                }
            }
            CircuitState::HalfOpen => {
                warn!(breaker = %self.name, "half_open probe failed, reopening");
                state.state = CircuitState::Open;
                state.consecutive_successes = 0;
                state.next_attempt_time = Some(now + self.config.reset_timeout);
                state.last_state_change = now;
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 2,
            call_timeout: std::time::Duration::from_millis(50),
            reset_timeout: std::time::Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new("test", fast_config());

        for _ in 0..2 {
            let _ = breaker
                .execute(|| async { Err::<(), _>(Error::transport("boom")) })
                .await;
        }

        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_rejects_immediately_while_open() {
        let breaker = CircuitBreaker::new("test", fast_config());
        for _ in 0..2 {
            let _ = breaker
                .execute(|| async { Err::<(), _>(Error::transport("boom")) })
                .await;
        }

        let result = breaker.execute(|| async { Ok::<_, Error>(42) }).await;
        assert!(matches!(result, Err(Error::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn test_non_retryable_failure_does_not_trip() {
        let breaker = CircuitBreaker::new("test", fast_config());

        for _ in 0..5 {
            let _ = breaker
                .execute(|| async { Err::<(), _>(Error::validation("bad input")) })
                .await;
        }

        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_closes_after_success_threshold() {
        let breaker = CircuitBreaker::new("test", fast_config());
        for _ in 0..2 {
            let _ = breaker
                .execute(|| async { Err::<(), _>(Error::transport("boom")) })
                .await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        for _ in 0..2 {
            let result = breaker.execute(|| async { Ok::<_, Error>(()) }).await;
            assert!(result.is_ok());
        }

        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("test", fast_config());
        for _ in 0..2 {
            let _ = breaker
                .execute(|| async { Err::<(), _>(Error::transport("boom")) })
                .await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let _ = breaker
            .execute(|| async { Err::<(), _>(Error::transport("still broken")) })
            .await;

        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_call_timeout_counts_as_failure() {
        let breaker = CircuitBreaker::new("test", fast_config());
        for _ in 0..2 {
            let result = breaker
                .execute(|| async {
                    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                    Ok::<_, Error>(())
                })
                .await;
            assert!(matches!(result, Err(Error::Timeout(_))));
        }

        assert_eq!(breaker.state().await, CircuitState::Open);
    }
}
