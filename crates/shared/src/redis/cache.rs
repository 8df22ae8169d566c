//! Generic Redis caching layer for entities (spec §4.H)
//!
//! Provides a write-through caching pattern for frequently accessed
//! entities (triggers, webhooks) and the inbound-payload idempotency
//! cache the webhook receiver consults before emitting an event.
//!
//! # Performance Characteristics
//!
//! - **Cache hit**: ~0.1-0.5ms (8-100x faster than PostgreSQL)
//! - **Cache miss**: Transparent fallback to database
//! - **Expected hit rate**: high for hot trigger/webhook lookups
//!
//! # Cache Strategy
//!
//! - **Write-through**: Updates written to both PostgreSQL and Redis
//! - **TTL**: Configurable per entity type (default 5 minutes)
//! - **Graceful degradation**: Falls back to PostgreSQL if Redis unavailable
//!
//! # Key Prefixes
//!
//! - `trigger:id:{trigger_id}` - Trigger by ID
//! - `webhook:id:{webhook_id}` - Inbound webhook by ID
//! - `inbound:{tenant_id}:{webhook_id}:{timestamp}` - Inbound payload snapshot

use anyhow::Result;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default cache TTL in seconds (5 minutes)
const DEFAULT_TTL_SECS: u64 = 300;

/// Entity cache manager for Redis
///
/// Generic caching layer that can cache any serializable entity.
#[derive(Clone)]
pub struct EntityCache {
    redis: ConnectionManager,
    ttl: Duration,
    enabled: bool,
}

impl EntityCache {
    /// Create a new entity cache
    ///
    /// # Arguments
    ///
    /// * `redis` - Redis connection manager
    /// * `ttl_secs` - Cache TTL in seconds (None for default 300s)
    pub fn new(redis: ConnectionManager, ttl_secs: Option<u64>) -> Self {
        let enabled = std::env::var("ENTITY_CACHE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let ttl = Duration::from_secs(ttl_secs.unwrap_or(DEFAULT_TTL_SECS));

        debug!(
            ttl_secs = ttl.as_secs(),
            enabled = enabled,
            "Initializing EntityCache"
        );

        Self {
            redis,
            ttl,
            enabled,
        }
    }

    /// Get an entity from cache
    ///
    /// Returns None if not found or on Redis error (graceful degradation)
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }

        let mut conn = self.redis.clone();

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(json_str)) => match serde_json::from_str(&json_str) {
                Ok(entity) => {
                    debug!(key = key, "Cache HIT");
                    Some(entity)
                }
                Err(e) => {
                    warn!(key = key, error = %e, "Failed to deserialize cached entity");
                    None
                }
            },
            Ok(None) => {
                debug!(key = key, "Cache MISS");
                None
            }
            Err(e) => {
                warn!(key = key, error = %e, "Redis cache read failed");
                None
            }
        }
    }

    /// Store an entity in cache
    ///
    /// Errors are logged but don't fail the operation (graceful degradation)
    pub async fn set<T: Serialize>(&self, key: &str, entity: &T) {
        if !self.enabled {
            return;
        }

        let mut conn = self.redis.clone();

        match serde_json::to_string(entity) {
            Ok(json_str) => {
                if let Err(e) = conn
                    .set_ex::<_, _, ()>(key, json_str, self.ttl.as_secs())
                    .await
                {
                    warn!(key = key, error = %e, "Redis cache write failed");
                }
            }
            Err(e) => {
                warn!(key = key, error = %e, "Failed to serialize entity for cache");
            }
        }
    }

    /// Store an entity in cache, surfacing failure to the caller.
    ///
    /// Used by call sites where a cache write is load-bearing (spec §4.H
    /// step 6: the inbound idempotency snapshot) and a write failure must
    /// turn into an error response rather than be swallowed.
    pub async fn try_set<T: Serialize>(&self, key: &str, entity: &T) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let mut conn = self.redis.clone();
        let json_str = serde_json::to_string(entity)?;
        conn.set_ex::<_, _, ()>(key, json_str, self.ttl.as_secs()).await?;
        Ok(())
    }

    /// Delete an entity from cache
    ///
    /// Errors are logged but don't fail the operation
    pub async fn delete(&self, key: &str) {
        if !self.enabled {
            return;
        }

        let mut conn = self.redis.clone();

        if let Err(e) = conn.del::<_, ()>(key).await {
            warn!(key = key, error = %e, "Redis cache delete failed");
        }
    }

    /// Delete multiple entities matching a pattern
    ///
    /// Uses SCAN to avoid blocking Redis (safe for production)
    pub async fn delete_pattern(&self, pattern: &str) {
        if !self.enabled {
            return;
        }

        let mut conn = self.redis.clone();

        // Use SCAN to find matching keys (non-blocking)
        let keys: Result<Vec<String>, _> = redis::cmd("SCAN")
            .arg(0)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(100)
            .query_async(&mut conn)
            .await;

        match keys {
            Ok(keys) if !keys.is_empty() => {
                if let Err(e) = conn.del::<_, ()>(&keys).await {
                    warn!(pattern = pattern, error = %e, "Redis pattern delete failed");
                }
            }
            Err(e) => {
                warn!(pattern = pattern, error = %e, "Redis SCAN failed");
            }
            _ => {}
        }
    }

    /// Check if caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get cache TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

// ============================================================================
// Key Builders
// ============================================================================

/// Maximum inbound body size eligible for the payload cache (spec §4.H
/// step 6: bodies over 1MB are not cached, only forwarded).
pub const MAX_CACHEABLE_BODY_BYTES: usize = 1024 * 1024;

/// TTL for cached inbound payload snapshots (24h, spec §4.H step 6).
pub const INBOUND_PAYLOAD_TTL_SECS: u64 = 24 * 60 * 60;

/// Build cache key for trigger by ID
pub fn trigger_key_by_id(trigger_id: &str) -> String {
    format!("trigger:id:{}", trigger_id)
}

/// Build cache key for an inbound webhook registration by ID
pub fn webhook_key_by_id(webhook_id: &str) -> String {
    format!("webhook:id:{}", webhook_id)
}

/// Build cache key pattern for all trigger keys (used to invalidate a
/// tenant's cached triggers after a mutation).
pub fn trigger_keys_pattern(tenant_id: &str) -> String {
    format!("trigger:*:{}*", tenant_id)
}

/// Build the inbound payload snapshot key: `inbound:{tenant}:{webhook}:{timestamp}`.
pub fn inbound_payload_key(tenant_id: &str, webhook_id: &str, timestamp: i64) -> String {
    format!("inbound:{}:{}:{}", tenant_id, webhook_id, timestamp)
}

/// Whether a body of `body_len` bytes is eligible for the inbound
/// payload cache (spec §4.H step 6).
pub fn should_cache_body(body_len: usize) -> bool {
    body_len <= MAX_CACHEABLE_BODY_BYTES
}

// ============================================================================
// Cached Repository Helpers
// ============================================================================

/// Get from cache or execute database fallback
///
/// This is a free function that provides cache-aside pattern:
/// 1. Check cache first
/// 2. On miss, fetch from database
/// 3. Cache the result for future reads
pub async fn get_or_fetch<T, F, Fut>(cache: &EntityCache, key: &str, fetch: F) -> Result<Option<T>>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
    F: FnOnce() -> Fut + Send,
    Fut: std::future::Future<Output = Result<Option<T>>> + Send,
{
    // Try cache first
    if let Some(cached) = cache.get::<T>(key).await {
        return Ok(Some(cached));
    }

    // Fetch from database
    let result = fetch().await?;

    // Cache the result if found
    if let Some(ref entity) = result {
        cache.set(key, entity).await;
    }

    Ok(result)
}

/// Marker trait for cache-aware repositories (optional, for documentation)
pub trait CacheAware {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_key_by_id() {
        assert_eq!(trigger_key_by_id("trigger_789"), "trigger:id:trigger_789");
    }

    #[test]
    fn test_webhook_key_by_id() {
        assert_eq!(webhook_key_by_id("wh_123"), "webhook:id:wh_123");
    }

    #[test]
    fn test_inbound_payload_key() {
        assert_eq!(
            inbound_payload_key("tenant_1", "wh_123", 1732800600),
            "inbound:tenant_1:wh_123:1732800600"
        );
    }

    #[test]
    fn test_should_cache_body_respects_1mb_cap() {
        assert!(should_cache_body(1024));
        assert!(should_cache_body(MAX_CACHEABLE_BODY_BYTES));
        assert!(!should_cache_body(MAX_CACHEABLE_BODY_BYTES + 1));
    }
}
