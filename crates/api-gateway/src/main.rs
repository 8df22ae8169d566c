//! API Gateway for the event-trigger orchestration platform
//!
//! REST API server providing webhook registration, the inbound webhook
//! receiver that turns external calls into platform events, and the
//! outbound delivery worker that relays events back out to registered
//! webhooks.

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use event_bus::{EventBus, JobQueue, RedisJobQueue};
use shared::{db, redis as shared_redis, Config};
use std::sync::Arc;

mod handlers;
mod middleware;
mod models;
mod repositories;
mod routes;
mod services;

use middleware::security_headers::SecurityHeaders;
use repositories::WebhookRepository;
use services::outbound_delivery::{OutboundDeliveryWorker, RedisOutboundDeliveryQueue};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    shared::init_tracing(config.logging.rate_limit_per_second);

    tracing::info!("Starting API Gateway...");

    let db_pool = db::create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;

    db::run_migrations(&db_pool)
        .await
        .context("Failed to run database migrations")?;

    db::check_health(&db_pool)
        .await
        .context("Database health check failed")?;

    let queue_conn = shared_redis::create_client(&config.redis.connection_url())
        .await
        .context("Failed to connect queue Redis client")?;
    let bus_conn = shared_redis::create_client(&config.pubsub.url)
        .await
        .context("Failed to connect pub/sub Redis client")?;
    let rate_limit_conn = shared_redis::create_client(&config.redis.connection_url())
        .await
        .context("Failed to connect rate limiter Redis client")?;
    let cache_conn = shared_redis::create_client(&config.redis.connection_url())
        .await
        .context("Failed to connect cache Redis client")?;
    let outbound_conn = shared_redis::create_client(&config.redis.connection_url())
        .await
        .context("Failed to connect outbound delivery Redis client")?;

    let rate_limiter = shared_redis::RateLimiter::new(rate_limit_conn)
        .await
        .context("Failed to create rate limiter")?;
    let cache = shared_redis::EntityCache::new(cache_conn, None);

    let store = event_bus::EventStore::new(db_pool.clone());
    let matcher = event_bus::TriggerMatcher::new(db_pool.clone());
    let job_queue: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::new(queue_conn));
    let event_bus = EventBus::new(store, matcher, job_queue, bus_conn);

    let webhook_repo = WebhookRepository::new(db_pool.clone());

    let encryption_key = shared::signature::derive_key(&config.encryption.key);
    let outbound_queue: Arc<dyn services::outbound_delivery::OutboundDeliveryQueue> =
        Arc::new(RedisOutboundDeliveryQueue::new(outbound_conn));
    let delivery_worker = OutboundDeliveryWorker::new(
        outbound_queue,
        Arc::new(webhook_repo.clone()),
        encryption_key,
    )
    .context("Failed to build outbound delivery worker")?;

    let worker_concurrency: usize = std::env::var("DELIVERY_WORKER_CONCURRENCY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8);

    let delivery_worker = Arc::new(delivery_worker);
    let mut worker_handles = Vec::with_capacity(worker_concurrency);
    for _ in 0..worker_concurrency {
        let worker = delivery_worker.clone();
        worker_handles.push(tokio::spawn(async move { worker.run().await }));
    }
    tracing::info!(concurrency = worker_concurrency, "Outbound delivery workers started");

    middleware::metrics::init_metrics();

    let server_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("API Gateway listening on {}", server_addr);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(SecurityHeaders::for_api())
            .wrap(Logger::default())
            .wrap(middleware::cors())
            .wrap(middleware::PrometheusMetrics::new())
            .wrap(middleware::RequestId::new())
            .app_data(web::JsonConfig::default().limit(1_048_576))
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(webhook_repo.clone()))
            .app_data(web::Data::new(rate_limiter.clone()))
            .app_data(web::Data::new(cache.clone()))
            .app_data(web::Data::new(event_bus.clone()))
            .configure(routes::configure)
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind to {}", server_addr))?;

    let server_handle = server.run();

    tokio::select! {
        result = server_handle => {
            result.context("Server error")?;
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown signal received, stopping API Gateway...");
        }
    }

    for handle in worker_handles {
        handle.abort();
    }

    tracing::info!("API Gateway shutdown complete");

    Ok(())
}
