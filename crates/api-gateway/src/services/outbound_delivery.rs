//! Outbound webhook delivery queue and worker (spec §4.I)
//!
//! A Redis sorted set doubles as the priority queue: score is the
//! webhook's current health priority (`HealthStatus::priority`), so a
//! degraded/unhealthy webhook's jobs fall behind healthy ones without a
//! second queue.

use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use shared::models::HealthStatus;
use shared::{signature, Error, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::repositories::WebhookRepository;

const OUTBOUND_QUEUE_KEY: &str = "outbound_delivery_queue";
const RETRY_BACKOFF_BASE_SECS: u64 = 30;
const MAX_ATTEMPTS: u32 = 4;
const DELIVERY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundDeliveryJob {
    pub id: String,
    pub webhook_id: String,
    pub event_name: String,
    pub payload: Value,
    pub attempt: u32,
}

impl OutboundDeliveryJob {
    pub fn new(webhook_id: &str, event_name: &str, payload: Value) -> Self {
        let ms_epoch = Utc::now().timestamp_millis();
        let mut suffix = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut suffix);

        Self {
            id: format!("{}-{}-{}", webhook_id, ms_epoch, hex::encode(suffix)),
            webhook_id: webhook_id.to_string(),
            event_name: event_name.to_string(),
            payload,
            attempt: 1,
        }
    }
}

#[async_trait]
pub trait OutboundDeliveryQueue: Send + Sync {
    async fn enqueue(&self, job: &OutboundDeliveryJob, priority: i32) -> Result<()>;
    async fn dequeue(&self) -> Result<Option<OutboundDeliveryJob>>;
}

#[derive(Clone)]
pub struct RedisOutboundDeliveryQueue {
    conn: ConnectionManager,
}

impl RedisOutboundDeliveryQueue {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl OutboundDeliveryQueue for RedisOutboundDeliveryQueue {
    async fn enqueue(&self, job: &OutboundDeliveryJob, priority: i32) -> Result<()> {
        let json = serde_json::to_string(job).map_err(|e| Error::internal(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(OUTBOUND_QUEUE_KEY, json, priority)
            .await
            .map_err(|e| Error::internal(format!("failed to enqueue outbound delivery job: {}", e)))?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<OutboundDeliveryJob>> {
        let mut conn = self.conn.clone();
        let popped: Vec<(String, f64)> = conn
            .zpopmin(OUTBOUND_QUEUE_KEY, 1)
            .await
            .map_err(|e| Error::internal(format!("failed to dequeue outbound delivery job: {}", e)))?;

        let Some((json, _score)) = popped.into_iter().next() else {
            return Ok(None);
        };

        let job: OutboundDeliveryJob = serde_json::from_str(&json).map_err(|e| {
            tracing::warn!(error = %e, "failed to parse outbound delivery job");
            Error::internal(e.to_string())
        })?;

        Ok(Some(job))
    }
}

/// Consumes delivery jobs, signs and POSTs the payload, records a
/// `WebhookDelivery` row, and advances the health-transition state
/// machine (spec §4.I).
pub struct OutboundDeliveryWorker {
    queue: Arc<dyn OutboundDeliveryQueue>,
    repo: Arc<WebhookRepository>,
    client: reqwest::Client,
    encryption_key: [u8; 32],
}

impl OutboundDeliveryWorker {
    pub fn new(
        queue: Arc<dyn OutboundDeliveryQueue>,
        repo: Arc<WebhookRepository>,
        encryption_key: [u8; 32],
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { queue, repo, client, encryption_key })
    }

    /// Run forever, polling the queue and dispatching one job at a time.
    /// Intended to be spawned as a background task per worker slot
    /// (spec §5: default concurrency 8).
    pub async fn run(&self) {
        loop {
            match self.queue.dequeue().await {
                Ok(Some(job)) => self.deliver(job).await,
                Ok(None) => tokio::time::sleep(Duration::from_millis(500)).await,
                Err(e) => {
                    tracing::error!(error = %e.safe_message(), "outbound delivery queue error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn deliver(&self, job: OutboundDeliveryJob) {
        let webhook = match self.repo.find_by_id_any_tenant(&job.webhook_id).await {
            Ok(Some(w)) => w,
            Ok(None) => {
                tracing::warn!(webhook_id = %job.webhook_id, "dropping delivery job for missing webhook");
                return;
            }
            Err(e) => {
                tracing::error!(webhook_id = %job.webhook_id, error = %e.safe_message(), "failed to load webhook for delivery");
                return;
            }
        };

        if webhook.status() == shared::models::WebhookStatus::Disabled {
            tracing::info!(webhook_id = %job.webhook_id, "skipping delivery to disabled webhook");
            return;
        }

        let secret = match signature::decrypt_secret(&webhook.secret_ciphertext, &self.encryption_key) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(webhook_id = %job.webhook_id, error = %e, "failed to decrypt webhook secret");
                return;
            }
        };

        let body = job.payload.to_string();
        let sig = signature::sign(body.as_bytes(), &secret);
        let payload_hash = hex::encode(Sha256::digest(body.as_bytes()));

        let started = std::time::Instant::now();
        let result = self
            .client
            .post(&webhook.url)
            .header("Content-Type", "application/json")
            .header("X-Signature", format!("sha256={}", sig))
            .header("User-Agent", "orchestration-core-Webhook/1.0")
            .body(body)
            .send()
            .await;
        let latency_ms = started.elapsed().as_millis() as i64;

        let (status, status_code, error_message, success) = match result {
            Ok(response) if response.status().is_success() => {
                ("success", Some(response.status().as_u16() as i32), None, true)
            }
            Ok(response) => {
                let code = response.status().as_u16() as i32;
                ("failed", Some(code), Some(format!("non-2xx status {}", code)), false)
            }
            Err(e) if e.is_timeout() => ("failed", None, Some("request_timeout".to_string()), false),
            Err(e) => ("failed", None, Some(e.to_string()), false),
        };

        if let Err(e) = self
            .repo
            .record_delivery(
                &job.webhook_id,
                &job.event_name,
                &payload_hash,
                &sig,
                status,
                status_code,
                error_message.as_deref(),
                Some(latency_ms),
                job.attempt as i32,
            )
            .await
        {
            tracing::error!(webhook_id = %job.webhook_id, error = %e.safe_message(), "failed to record webhook delivery");
        }

        if let Err(e) = self.repo.record_delivery_outcome(&job.webhook_id, success, latency_ms).await {
            tracing::error!(webhook_id = %job.webhook_id, error = %e.safe_message(), "failed to update webhook health");
        }

        if !success && job.attempt < MAX_ATTEMPTS {
            self.schedule_retry(job).await;
        }
    }

    async fn schedule_retry(&self, mut job: OutboundDeliveryJob) {
        let delay = retry_delay(job.attempt);
        job.attempt += 1;

        tokio::time::sleep(delay).await;

        let priority = self
            .repo
            .find_by_id_any_tenant(&job.webhook_id)
            .await
            .ok()
            .flatten()
            .map(|w| w.health_status().priority())
            .unwrap_or(HealthStatus::Unknown.priority());

        if let Err(e) = self.queue.enqueue(&job, priority).await {
            tracing::error!(webhook_id = %job.webhook_id, error = %e.safe_message(), "failed to requeue delivery retry");
        }
    }
}

/// Delay before attempt `attempt` (1-indexed, already made): 0s, 30s, 60s, 120s.
fn retry_delay(attempt: u32) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    Duration::from_secs(RETRY_BACKOFF_BASE_SECS * 2u64.pow(attempt - 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_schedule() {
        assert_eq!(retry_delay(1), Duration::ZERO);
        assert_eq!(retry_delay(2), Duration::from_secs(30));
        assert_eq!(retry_delay(3), Duration::from_secs(60));
        assert_eq!(retry_delay(4), Duration::from_secs(120));
    }

    #[test]
    fn test_job_id_format_has_three_dash_separated_parts() {
        let job = OutboundDeliveryJob::new("wh_1", "form.submitted", serde_json::json!({}));
        let parts: Vec<&str> = job.id.rsplitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 16); // 8 random bytes as hex
    }

    #[tokio::test]
    async fn test_mock_queue_round_trip() {
        use mockall::mock;

        mock! {
            pub Queue {}

            #[async_trait]
            impl OutboundDeliveryQueue for Queue {
                async fn enqueue(&self, job: &OutboundDeliveryJob, priority: i32) -> Result<()>;
                async fn dequeue(&self) -> Result<Option<OutboundDeliveryJob>>;
            }
        }

        let mut mock = MockQueue::new();
        mock.expect_enqueue().times(1).returning(|_, _| Ok(()));
        let job = OutboundDeliveryJob::new("wh_1", "form.submitted", serde_json::json!({}));
        assert!(mock.enqueue(&job, 1).await.is_ok());
    }
}
