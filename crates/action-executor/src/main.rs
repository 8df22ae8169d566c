//! Action executor service
//!
//! Pops action-chain jobs from the queue the event bus enqueues onto,
//! loads the job's trigger, and runs `execute_chain` against the job's
//! event data. Runs `WORKER_CONCURRENCY` consumer tasks side by side;
//! chains are sequential internally but unordered across jobs (spec §5).

use anyhow::{Context, Result};
use action_executor::{ChainExecutor, Dlq, HttpActionDispatcher, JobConsumer, RedisJobConsumer};
use shared::{db, redis as shared_redis, Config};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

const DEFAULT_WORKER_CONCURRENCY: usize = 8;
const CONSUME_BLOCK_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    shared::init_tracing(config.logging.rate_limit_per_second);
    tracing::info!("Starting action executor...");

    let db_pool = db::create_pool(&config.database).await.context("Failed to create database pool")?;
    db::check_health(&db_pool).await.context("Database health check failed")?;

    let redis_client = redis::Client::open(config.redis.connection_url()).context("Failed to create Redis client")?;
    let consumer_conn = redis_client.get_connection_manager().await.context("Failed to connect consumer Redis client")?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let dispatcher: Arc<dyn action_executor::ActionDispatcher> = Arc::new(HttpActionDispatcher::new(http_client));
    let dlq = Arc::new(Dlq::new(db_pool.clone()));
    let executor = Arc::new(ChainExecutor::new(db_pool.clone(), dispatcher, dlq, config.tracing.sample_rate));
    let consumer: Arc<dyn JobConsumer> = Arc::new(RedisJobConsumer::new(consumer_conn));

    let worker_count = std::env::var("WORKER_CONCURRENCY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_WORKER_CONCURRENCY);

    tracing::info!(worker_count, "spawning action-chain consumer workers");
    let mut handles = Vec::with_capacity(worker_count);
    for worker_id in 0..worker_count {
        let consumer = consumer.clone();
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            run_worker(worker_id, consumer, executor).await;
        }));
    }

    signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received, stopping action executor...");

    for handle in handles {
        handle.abort();
    }

    Ok(())
}

async fn run_worker(worker_id: usize, consumer: Arc<dyn JobConsumer>, executor: Arc<ChainExecutor>) {
    loop {
        match consumer.consume(CONSUME_BLOCK_SECS).await {
            Ok(Some(job)) => {
                let trigger = match executor.load_trigger(&job.trigger_id).await {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::error!(worker_id, job_id = %job.id, error = %e.safe_message(), "failed to load trigger for job");
                        continue;
                    }
                };

                if let Err(e) = executor.execute_chain(&job.event_id, &job.event_data, &trigger).await {
                    tracing::warn!(worker_id, job_id = %job.id, trigger_id = %job.trigger_id, error = %e.safe_message(), "action chain did not complete successfully");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(worker_id, error = %e.safe_message(), "error consuming action job");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
