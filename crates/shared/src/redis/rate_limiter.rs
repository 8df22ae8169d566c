//! Redis-based rate limiter with sliding window algorithm (spec §4.H)
//!
//! Bounds inbound webhook traffic per registered `InboundWebhook`: 100
//! requests per 60-second window by default. Same atomic check-and-increment
//! shape as the teacher's rate limiter, narrowed to the one scope the
//! inbound receiver needs.
//!
//! # Architecture
//!
//! - **Sliding window**: configurable window with 1-second granularity buckets
//! - **Atomic operations**: Redis Lua script for check-and-increment
//! - **Graceful degradation**: fails open if Redis is unavailable
//!
//! # Example
//!
//! ```no_run
//! use shared::redis::{RateLimiter, RateLimitScope};
//!
//! # async fn example(redis_manager: redis::aio::ConnectionManager) -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = RateLimiter::new(redis_manager).await?;
//!
//! let result = limiter
//!     .check(RateLimitScope::Webhook("wh_123".to_string()), 100, 1)
//!     .await?;
//!
//! if !result.allowed {
//!     println!("Retry after: {}", result.retry_after);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use redis::{aio::ConnectionManager, AsyncCommands, Script};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, warn};

/// Rate limit scope (determines the Redis key prefix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitScope {
    /// Inbound webhook, scoped by `InboundWebhook::id` (spec §4.H step 3).
    Webhook(String),
    /// Tenant-wide, for future aggregate limits across a tenant's webhooks.
    Tenant(String),
}

impl RateLimitScope {
    /// Get the Redis key prefix for this scope
    pub fn key_prefix(&self) -> String {
        match self {
            RateLimitScope::Webhook(id) => format!("rl:webhook:{}", id),
            RateLimitScope::Tenant(tenant_id) => format!("rl:tenant:{}", tenant_id),
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> String {
        match self {
            RateLimitScope::Webhook(id) => format!("webhook {}", id),
            RateLimitScope::Tenant(tenant_id) => format!("tenant {}", tenant_id),
        }
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Current usage in the window (after this request if allowed)
    pub current_usage: i64,
    /// The configured limit
    pub limit: i64,
    /// Unix timestamp when the rate limit resets
    pub reset_at: i64,
    /// Seconds until the rate limit resets (convenience field, used for `Retry-After`)
    pub retry_after: i64,
    /// Remaining quota (limit - current_usage)
    pub remaining: i64,
}

impl RateLimitResult {
    /// Create a result from Lua script response
    fn from_lua_response(response: Vec<i64>, current_time: i64) -> Self {
        let allowed = response[0] == 1;
        let current_usage = response[1];
        let limit = response[2];
        let reset_at = response[3];
        let retry_after = (reset_at - current_time).max(0);
        let remaining = (limit - current_usage).max(0);

        Self {
            allowed,
            current_usage,
            limit,
            reset_at,
            retry_after,
            remaining,
        }
    }

    /// Create a "fail-open" result (allows request when Redis is down)
    fn fail_open(limit: i64) -> Self {
        let current_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;

        Self {
            allowed: true,
            current_usage: 0,
            limit,
            reset_at: current_time + 60,
            retry_after: 0,
            remaining: limit,
        }
    }
}

/// Redis-based rate limiter
///
/// Uses a Lua script for atomic check-and-increment operations.
#[derive(Clone)]
pub struct RateLimiter {
    /// Redis connection manager
    redis: ConnectionManager,
    /// Lua script for rate limiting
    script: Script,
    /// Window size in seconds (default: 60, per spec §4.H)
    window_seconds: i64,
    /// Whether to fail open (allow requests) when Redis is unavailable
    fail_open: bool,
}

impl RateLimiter {
    /// Default window size for inbound webhook rate limiting (spec §4.H: 100 req / 60s)
    pub const DEFAULT_WINDOW: i64 = 60;
    /// Default request budget per window for inbound webhooks
    pub const DEFAULT_WEBHOOK_LIMIT: i64 = 100;

    /// Lua script source (embedded at compile time)
    const LUA_SCRIPT: &'static str = include_str!("rate_limit.lua");

    /// Create a new rate limiter with default settings (60s window, fail-open enabled)
    pub async fn new(redis: ConnectionManager) -> Result<Self> {
        Self::with_config(redis, Self::DEFAULT_WINDOW, true).await
    }

    /// Create a rate limiter with custom configuration
    pub async fn with_config(
        redis: ConnectionManager,
        window_seconds: i64,
        fail_open: bool,
    ) -> Result<Self> {
        let script = Script::new(Self::LUA_SCRIPT);

        debug!(
            window_seconds = window_seconds,
            fail_open = fail_open,
            "Rate limiter initialized"
        );

        Ok(Self {
            redis,
            script,
            window_seconds,
            fail_open,
        })
    }

    /// Check rate limit and increment if allowed.
    ///
    /// Performs an atomic check-and-increment using a Lua script. `cost`
    /// lets a single call consume more than one unit of budget; inbound
    /// webhook delivery checks always pass `cost = 1`.
    pub async fn check(
        &self,
        scope: RateLimitScope,
        limit: i64,
        cost: i64,
    ) -> Result<RateLimitResult> {
        let key_prefix = scope.key_prefix();
        let current_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::internal(format!("System time error: {}", e)))?
            .as_secs() as i64;

        debug!(
            scope = %scope.description(),
            limit = limit,
            cost = cost,
            "Checking rate limit"
        );

        let mut conn = self.redis.clone();
        let result = self
            .script
            .key(&key_prefix)
            .arg(limit)
            .arg(self.window_seconds)
            .arg(cost)
            .arg(current_time)
            .invoke_async::<Vec<i64>>(&mut conn)
            .await;

        match result {
            Ok(response) => {
                let result = RateLimitResult::from_lua_response(response, current_time);

                if result.allowed {
                    debug!(
                        scope = %scope.description(),
                        current_usage = result.current_usage,
                        remaining = result.remaining,
                        "Rate limit check: ALLOWED"
                    );
                } else {
                    warn!(
                        scope = %scope.description(),
                        current_usage = result.current_usage,
                        limit = limit,
                        retry_after = result.retry_after,
                        "Rate limit check: REJECTED"
                    );
                }

                Ok(result)
            }
            Err(e) => {
                error!(
                    scope = %scope.description(),
                    error = %e,
                    "Redis error during rate limit check"
                );

                if self.fail_open {
                    warn!(
                        scope = %scope.description(),
                        "Redis unavailable, failing open (allowing request)"
                    );
                    Ok(RateLimitResult::fail_open(limit))
                } else {
                    Err(Error::internal(format!("Rate limiter unavailable: {}", e)))
                }
            }
        }
    }

    /// Convenience wrapper applying the default webhook budget (spec §4.H step 3).
    pub async fn check_webhook(&self, webhook_id: &str) -> Result<RateLimitResult> {
        self.check(
            RateLimitScope::Webhook(webhook_id.to_string()),
            Self::DEFAULT_WEBHOOK_LIMIT,
            1,
        )
        .await
    }

    /// Reset rate limit for a scope (for testing or admin operations)
    #[cfg(test)]
    pub async fn reset(&self, scope: RateLimitScope) -> Result<()> {
        let key_pattern = format!("{}:*", scope.key_prefix());
        let mut redis = self.redis.clone();

        let keys: Vec<String> = redis
            .keys(&key_pattern)
            .await
            .map_err(|e| Error::internal(format!("Failed to find keys: {}", e)))?;

        if !keys.is_empty() {
            redis
                .del::<_, ()>(&keys)
                .await
                .map_err(|e| Error::internal(format!("Failed to delete keys: {}", e)))?;

            debug!(scope = %scope.description(), keys_deleted = keys.len(), "Rate limit reset");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_scope_key_prefix() {
        assert_eq!(
            RateLimitScope::Webhook("wh_123".to_string()).key_prefix(),
            "rl:webhook:wh_123"
        );
        assert_eq!(
            RateLimitScope::Tenant("tenant_456".to_string()).key_prefix(),
            "rl:tenant:tenant_456"
        );
    }

    #[test]
    fn test_rate_limit_result_remaining() {
        let result = RateLimitResult::from_lua_response(vec![1, 25, 100, 1732804200], 1732800600);

        assert!(result.allowed);
        assert_eq!(result.current_usage, 25);
        assert_eq!(result.limit, 100);
        assert_eq!(result.remaining, 75);
    }

    #[test]
    fn test_rate_limit_result_exceeded() {
        let result = RateLimitResult::from_lua_response(vec![0, 105, 100, 1732804200], 1732800600);

        assert!(!result.allowed);
        assert_eq!(result.current_usage, 105);
        assert_eq!(result.remaining, 0); // Clamped to 0
    }

    #[test]
    fn test_fail_open_result() {
        let result = RateLimitResult::fail_open(100);

        assert!(result.allowed);
        assert_eq!(result.current_usage, 0);
        assert_eq!(result.remaining, 100);
    }
}
