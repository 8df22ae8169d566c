//! Event bus service
//!
//! Wires the Event Store, Trigger Matcher, and action-chain job queue
//! into an `EventBus`, then runs the Redis pub/sub listener and the
//! polling fallback side by side so a quiet Redis never loses events.

use anyhow::{Context, Result};
use event_bus::{
    EventBus, EventListener, EventStore, JobQueue, PollingFallback, RedisJobQueue,
    SubscriptionRegistry, TriggerMatcher,
};
use shared::{db, redis as shared_redis, Config};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    shared::init_tracing(config.logging.rate_limit_per_second);
    tracing::info!("Starting event bus service...");

    let db_pool = db::create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;
    db::check_health(&db_pool)
        .await
        .context("Database health check failed")?;

    let queue_conn = shared_redis::create_client(&config.redis.connection_url())
        .await
        .context("Failed to connect queue Redis client")?;
    let bus_conn = shared_redis::create_client(&config.pubsub.url)
        .await
        .context("Failed to connect pub/sub Redis client")?;
    let pubsub_client =
        redis::Client::open(config.pubsub.url.clone()).context("Invalid pub/sub Redis URL")?;

    let store = EventStore::new(db_pool.clone());
    let matcher = TriggerMatcher::new(db_pool.clone());
    let queue: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::new(queue_conn));
    let registry = SubscriptionRegistry::new();

    let bus = Arc::new(EventBus::new(store, matcher, queue, bus_conn));
    let listener = EventListener::new(pubsub_client, registry);
    let fallback = Arc::new(PollingFallback::new(bus.clone()));

    let listener_handle = tokio::spawn(async move {
        loop {
            if let Err(e) = listener.start().await {
                tracing::error!(error = %e.safe_message(), "event listener disconnected, retrying");
            }
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    });

    let fallback_handle = tokio::spawn({
        let fallback = fallback.clone();
        async move { fallback.start().await }
    });

    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown signal received, stopping event bus service...");
        }
        result = fallback_handle => {
            match result {
                Ok(Ok(())) => tracing::warn!("Polling fallback exited cleanly (unexpected)"),
                Ok(Err(e)) => {
                    tracing::error!(error = %e.safe_message(), "Polling fallback failed");
                    anyhow::bail!("Polling fallback failed: {}", e.safe_message());
                }
                Err(e) => {
                    tracing::error!("Polling fallback task panicked: {}", e);
                    anyhow::bail!("Polling fallback task panicked: {}", e);
                }
            }
        }
    }

    listener_handle.abort();

    Ok(())
}
