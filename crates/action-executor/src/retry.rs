//! Retry delay calculation for action execution (spec §4.F)
//!
//! Unlike the teacher's capped exponential backoff, the delay formula here
//! is dictated per-action by `Action::retry_config()` and has no ceiling:
//! `initial_delay_ms * backoff_multiplier^(attempt-1)`.

use shared::models::RetryConfig;
use std::time::Duration;

/// Delay to sleep after `attempt` (1-indexed) has failed, before retrying.
/// `initial_delay_ms * backoff_multiplier^(attempt-1)`, uncapped.
pub fn delay_for_attempt(retry_config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let delay_ms = retry_config.initial_delay_ms as f64 * retry_config.backoff_multiplier.powi(exponent as i32);
    Duration::from_millis(delay_ms.round() as u64)
}

/// Whether `attempt` (1-indexed, already made) leaves attempts remaining.
pub fn should_retry(retry_config: &RetryConfig, attempt: u32) -> bool {
    attempt < retry_config.max_attempts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            backoff_multiplier: 2.0,
            initial_delay_ms: 10,
        }
    }

    #[test]
    fn test_delay_grows_exponentially_uncapped() {
        let cfg = config();
        assert_eq!(delay_for_attempt(&cfg, 1), Duration::from_millis(10));
        assert_eq!(delay_for_attempt(&cfg, 2), Duration::from_millis(20));
        assert_eq!(delay_for_attempt(&cfg, 3), Duration::from_millis(40));
        assert_eq!(delay_for_attempt(&cfg, 4), Duration::from_millis(80));
    }

    #[test]
    fn test_should_retry_respects_max_attempts() {
        let cfg = config();
        assert!(should_retry(&cfg, 1));
        assert!(should_retry(&cfg, 2));
        assert!(!should_retry(&cfg, 3));
    }

    #[test]
    fn test_retry_config_default_matches_shared_model() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.backoff_multiplier, 2.0);
        assert_eq!(cfg.initial_delay_ms, 1000);
        assert_eq!(delay_for_attempt(&cfg, 1), Duration::from_millis(1000));
    }
}
