//! Dead Letter Queue (spec §4.G)
//!
//! Snapshots the originating event/action at failure time so a later
//! retry is independent of subsequent mutations or deletions of the
//! trigger/action rows themselves.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::dispatcher::ActionDispatcher;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use shared::models::{Action, DlqEntry, DlqStatus};

/// Counts by status, for `stats`.
#[derive(Debug, Clone, Default)]
pub struct DlqStats {
    pub pending: i64,
    pub processing: i64,
    pub resolved: i64,
    pub failed: i64,
    pub ignored: i64,
}

#[derive(Debug, Clone)]
pub struct BulkRetryFailure {
    pub id: String,
    pub error: String,
}

pub struct Dlq {
    pool: PgPool,
}

impl Dlq {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert by `(event_id, action_id)`: new row on first failure,
    /// otherwise increment `failure_count` and refresh the error fields.
    pub async fn add(
        &self,
        event_id: &str,
        trigger_id: &str,
        action_id: &str,
        reason: &str,
        last_error: &str,
        event_snapshot: Value,
        action_snapshot: Value,
        retry_after: Option<DateTime<Utc>>,
    ) -> WorkerResult<DlqEntry> {
        let action_type = action_snapshot
            .get("action_type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let entry = sqlx::query_as::<_, DlqEntry>(
            r#"
            INSERT INTO dead_letter_queue
                (id, event_id, trigger_id, action_id, failure_reason, failure_count,
                 last_error, event_snapshot, action_snapshot, status, retry_after,
                 created_at, updated_at)
            VALUES
                (gen_random_uuid()::text, $1, $2, $3, $4, 1, $5, $6, $7, 'pending', $8, now(), now())
            ON CONFLICT (event_id, action_id) DO UPDATE SET
                failure_count = dead_letter_queue.failure_count + 1,
                failure_reason = EXCLUDED.failure_reason,
                last_error = EXCLUDED.last_error,
                retry_after = EXCLUDED.retry_after,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(event_id)
        .bind(trigger_id)
        .bind(action_id)
        .bind(reason)
        .bind(last_error)
        .bind(&event_snapshot)
        .bind(&action_snapshot)
        .bind(retry_after)
        .fetch_one(&self.pool)
        .await
        .map_err(WorkerError::Database)?;

        metrics::record_job_dlq(&action_type);
        Ok(entry)
    }

    /// Legal only from `pending` with `retry_after <= now`. Dispatches the
    /// snapshot through `dispatcher`; success resolves the row, failure
    /// reverts it to `pending` with an incremented `failure_count`.
    pub async fn retry(&self, dlq_id: &str, dispatcher: &dyn ActionDispatcher) -> WorkerResult<DlqEntry> {
        let entry = self.get(dlq_id).await?;

        if !matches!(entry.status(), DlqStatus::Pending) {
            return Err(WorkerError::invalid_config(format!(
                "DLQ entry {} is not pending (status={})",
                dlq_id, entry.status()
            )));
        }
        if let Some(retry_after) = entry.retry_after {
            if retry_after > Utc::now() {
                return Err(WorkerError::invalid_config(format!(
                    "DLQ entry {} is not yet eligible for retry (retry_after={})",
                    dlq_id, retry_after
                )));
            }
        }

        self.set_status(dlq_id, DlqStatus::Processing).await?;

        let action: Action = serde_json::from_value(entry.action_snapshot.clone())
            .map_err(WorkerError::Serialization)?;
        let config = action.config.clone();

        match dispatcher.execute(&action, &config).await {
            Ok(_) => self.mark_resolved(dlq_id).await,
            Err(e) => {
                self.revert_to_pending(dlq_id, &e.safe_message()).await?;
                Err(e)
            }
        }
    }

    /// Retry `ids` in batches of `max_concurrent`, collecting successes and
    /// per-id failures independently — one entry's failure never aborts
    /// the rest of the batch.
    pub async fn bulk_retry(
        &self,
        ids: &[String],
        dispatcher: &dyn ActionDispatcher,
        max_concurrent: usize,
    ) -> WorkerResult<(Vec<String>, Vec<BulkRetryFailure>)> {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for batch in ids.chunks(max_concurrent.max(1)) {
            let results = futures_util::future::join_all(
                batch.iter().map(|id| async move { (id.clone(), self.retry(id, dispatcher).await) }),
            )
            .await;

            for (id, result) in results {
                match result {
                    Ok(_) => succeeded.push(id),
                    Err(e) => failed.push(BulkRetryFailure { id, error: e.safe_message() }),
                }
            }
        }

        Ok((succeeded, failed))
    }

    /// Terminal human decision; cannot be retried afterwards.
    pub async fn mark_failed(&self, id: &str, reason: &str) -> WorkerResult<DlqEntry> {
        sqlx::query_as::<_, DlqEntry>(
            "UPDATE dead_letter_queue SET status = 'failed', last_error = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(reason)
        .fetch_one(&self.pool)
        .await
        .map_err(WorkerError::Database)
    }

    /// Delete only when `resolved`, unless `force`.
    pub async fn delete(&self, id: &str, force: bool) -> WorkerResult<()> {
        if !force {
            let entry = self.get(id).await?;
            if !matches!(entry.status(), DlqStatus::Resolved) {
                return Err(WorkerError::invalid_config(format!(
                    "DLQ entry {} is not resolved; pass force=true to delete anyway",
                    id
                )));
            }
        }

        sqlx::query("DELETE FROM dead_letter_queue WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(WorkerError::Database)?;
        Ok(())
    }

    pub async fn stats(
        &self,
        tenant: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> WorkerResult<DlqStats> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT d.status, COUNT(*)
            FROM dead_letter_queue d
            JOIN events e ON e.id = d.event_id
            WHERE ($1::text IS NULL OR e.tenant_id = $1)
              AND ($2::timestamptz IS NULL OR d.created_at >= $2)
              AND ($3::timestamptz IS NULL OR d.created_at <= $3)
            GROUP BY d.status
            "#,
        )
        .bind(tenant)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(WorkerError::Database)?;

        let mut stats = DlqStats::default();
        for (status, count) in rows {
            match status.parse::<DlqStatus>() {
                Ok(DlqStatus::Pending) => stats.pending = count,
                Ok(DlqStatus::Processing) => stats.processing = count,
                Ok(DlqStatus::Resolved) => stats.resolved = count,
                Ok(DlqStatus::Failed) => stats.failed = count,
                Ok(DlqStatus::Ignored) => stats.ignored = count,
                Err(_) => {}
            }
        }
        Ok(stats)
    }

    /// Delete `resolved` rows older than `retention_days`; returns count removed.
    pub async fn cleanup(&self, retention_days: i64) -> WorkerResult<u64> {
        let result = sqlx::query(
            "DELETE FROM dead_letter_queue WHERE status = 'resolved' AND resolved_at < now() - ($1 || ' days')::interval",
        )
        .bind(retention_days.to_string())
        .execute(&self.pool)
        .await
        .map_err(WorkerError::Database)?;
        Ok(result.rows_affected())
    }

    pub async fn pending(
        &self,
        tenant: Option<&str>,
        event_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> WorkerResult<Vec<DlqEntry>> {
        sqlx::query_as::<_, DlqEntry>(
            r#"
            SELECT d.* FROM dead_letter_queue d
            JOIN events e ON e.id = d.event_id
            WHERE d.status = 'pending'
              AND ($1::text IS NULL OR e.tenant_id = $1)
              AND ($2::text IS NULL OR e.event_type = $2)
            ORDER BY d.created_at ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant)
        .bind(event_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(WorkerError::Database)
    }

    async fn get(&self, id: &str) -> WorkerResult<DlqEntry> {
        sqlx::query_as::<_, DlqEntry>("SELECT * FROM dead_letter_queue WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(WorkerError::Database)?
            .ok_or_else(|| WorkerError::invalid_config(format!("DLQ entry {} not found", id)))
    }

    async fn set_status(&self, id: &str, status: DlqStatus) -> WorkerResult<()> {
        sqlx::query("UPDATE dead_letter_queue SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .execute(&self.pool)
            .await
            .map_err(WorkerError::Database)?;
        Ok(())
    }

    async fn mark_resolved(&self, id: &str) -> WorkerResult<DlqEntry> {
        sqlx::query_as::<_, DlqEntry>(
            "UPDATE dead_letter_queue SET status = 'resolved', resolved_at = now(), updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(WorkerError::Database)
    }

    async fn revert_to_pending(&self, id: &str, last_error: &str) -> WorkerResult<()> {
        sqlx::query(
            "UPDATE dead_letter_queue SET status = 'pending', failure_count = failure_count + 1, last_error = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(last_error)
        .execute(&self.pool)
        .await
        .map_err(WorkerError::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dlq_stats_default_is_zero() {
        let stats = DlqStats::default();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.resolved, 0);
    }
}
