//! Job queue abstraction for action-chain job enqueueing
//!
//! Provides a trait-based abstraction over the job queue to enable testing.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use shared::{ActionJob, Error, Result, ACTION_JOBS_QUEUE};

/// Abstract job queue interface for testability
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue an action-chain job for processing
    async fn enqueue(&self, job: &ActionJob) -> Result<()>;
}

/// Redis-backed job queue implementation
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
}

impl RedisJobQueue {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &ActionJob) -> Result<()> {
        let job_json = serde_json::to_string(job)
            .map_err(|e| Error::internal(format!("Failed to serialize action job: {}", e)))?;

        // NOTE: LPUSH maintains FIFO order and ignores job.priority. Priority
        // ordering within a batch can be layered on by the executor's consumer
        // if needed; for now consumption is simple FIFO (LPUSH + BRPOP).
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(ACTION_JOBS_QUEUE, &job_json)
            .await
            .map_err(|e| Error::internal(format!("Failed to enqueue action job to Redis: {}", e)))?;

        tracing::debug!(
            job_id = %job.id,
            trigger_id = %job.trigger_id,
            event_id = %job.event_id,
            "Enqueued action-chain job"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use serde_json::json;

    mock! {
        pub JobQueue {}

        #[async_trait]
        impl JobQueue for JobQueue {
            async fn enqueue(&self, job: &ActionJob) -> Result<()>;
        }
    }

    #[tokio::test]
    async fn test_mock_job_queue() {
        let mut mock_queue = MockJobQueue::new();

        mock_queue.expect_enqueue().times(1).returning(|_| Ok(()));

        let job = ActionJob::new("trigger-1", "event-1", 1, json!({"tenant_id": "t1"}));

        let result = mock_queue.enqueue(&job).await;
        assert!(result.is_ok());
    }
}
