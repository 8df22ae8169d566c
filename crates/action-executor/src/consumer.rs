//! Job consumer for reading action-chain jobs from the Redis queue
//!
//! # Security
//!
//! Jobs carry a `created_at`; consumers reject jobs older than
//! `DEFAULT_JOB_TTL_SECS` rather than process stale, possibly
//! superseded work.

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use shared::{ActionJob, ACTION_JOBS_QUEUE};

use crate::error::{WorkerError, WorkerResult};

pub const DEFAULT_JOB_TTL_SECS: i64 = 3600;

#[async_trait]
pub trait JobConsumer: Send + Sync {
    /// Block up to `timeout_secs` waiting for the next job.
    async fn consume(&self, timeout_secs: u64) -> WorkerResult<Option<ActionJob>>;

    async fn queue_len(&self) -> WorkerResult<u64>;
}

#[derive(Clone)]
pub struct RedisJobConsumer {
    conn: ConnectionManager,
    queue_name: String,
}

impl RedisJobConsumer {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, queue_name: ACTION_JOBS_QUEUE.to_string() }
    }

    #[cfg(test)]
    pub fn with_queue_name(conn: ConnectionManager, queue_name: &str) -> Self {
        Self { conn, queue_name: queue_name.to_string() }
    }
}

#[async_trait]
impl JobConsumer for RedisJobConsumer {
    async fn consume(&self, timeout_secs: u64) -> WorkerResult<Option<ActionJob>> {
        let mut conn = self.conn.clone();

        let result: Option<(String, String)> = conn
            .brpop(&self.queue_name, timeout_secs as f64)
            .await
            .map_err(WorkerError::Redis)?;

        let Some((_, json)) = result else { return Ok(None) };

        let job: ActionJob = serde_json::from_str(&json).map_err(|e| {
            tracing::warn!(error = %e, "failed to parse action job from queue");
            WorkerError::Serialization(e)
        })?;

        let age_secs = (Utc::now() - job.created_at).num_seconds();
        if age_secs > DEFAULT_JOB_TTL_SECS {
            tracing::warn!(job_id = %job.id, age_secs, ttl_secs = DEFAULT_JOB_TTL_SECS, "dropped stale action job");
            return Ok(None);
        }

        tracing::debug!(job_id = %job.id, trigger_id = %job.trigger_id, event_id = %job.event_id, age_secs, "consumed action job");
        Ok(Some(job))
    }

    async fn queue_len(&self) -> WorkerResult<u64> {
        let mut conn = self.conn.clone();
        conn.llen(&self.queue_name).await.map_err(WorkerError::Redis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use serde_json::json;

    mock! {
        pub JobConsumer {}

        #[async_trait]
        impl JobConsumer for JobConsumer {
            async fn consume(&self, timeout_secs: u64) -> WorkerResult<Option<ActionJob>>;
            async fn queue_len(&self) -> WorkerResult<u64>;
        }
    }

    #[tokio::test]
    async fn test_mock_consumer_returns_job() {
        let mut mock = MockJobConsumer::new();
        mock.expect_consume()
            .times(1)
            .returning(|_| Ok(Some(ActionJob::new("trigger-1", "event-1", 1, json!({"tenant_id": "t1"})))));

        let job = mock.consume(5).await.unwrap().unwrap();
        assert_eq!(job.trigger_id, "trigger-1");
    }

    #[tokio::test]
    async fn test_mock_consumer_timeout() {
        let mut mock = MockJobConsumer::new();
        mock.expect_consume().times(1).returning(|_| Ok(None));
        assert!(mock.consume(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_queue_len() {
        let mut mock = MockJobConsumer::new();
        mock.expect_queue_len().times(1).returning(|| Ok(42));
        assert_eq!(mock.queue_len().await.unwrap(), 42);
    }
}
