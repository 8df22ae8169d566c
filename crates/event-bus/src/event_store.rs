//! Event Store (spec §4.C)
//!
//! Append, dedupe, and retry-state operations over the `events` table.
//! All operations are tenant-scoped where the caller provides a
//! `tenant_id`; `claim_pending`/`fail_attempt` drive the poller's
//! at-least-once recovery path (§4.D).

use chrono::{DateTime, Utc};
use shared::models::{Event, NewEvent};
use shared::{DbPool, Error, Result};

/// Window within which an identical `(tenant_id, event_type, entity_id)`
/// triple is considered a duplicate submission.
const DEDUPE_WINDOW_MINUTES: i64 = 5;

/// Batch size for `claim_pending` (spec §4.C default).
const DEFAULT_CLAIM_BATCH: i64 = 10;

/// Terminal retry ceiling: at this many attempts, an event is marked
/// `failed` instead of rescheduled.
const MAX_RETRY_COUNT: i32 = 10;

#[derive(Clone)]
pub struct EventStore {
    db_pool: DbPool,
}

impl EventStore {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }

    /// Persist a new event. Assigns `id` if absent and sets
    /// `processing_mode=poll` until the bus marks it broadcast.
    pub async fn append(&self, new_event: NewEvent) -> Result<Event> {
        let id = uuid::Uuid::new_v4().to_string();

        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (
                id, tenant_id, event_type, entity_type, entity_id, actor_id,
                data, processing_mode, retry_count, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'poll', 0, now())
            RETURNING
                id, tenant_id, event_type, entity_type, entity_id, actor_id,
                data, processing_mode, retry_count, next_retry_at, last_error,
                processed_at, created_at
            "#,
        )
        .bind(&id)
        .bind(&new_event.tenant_id)
        .bind(&new_event.event_type)
        .bind(&new_event.entity_type)
        .bind(&new_event.entity_id)
        .bind(&new_event.actor_id)
        .bind(&new_event.data)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(event)
    }

    /// `true` if a prior event with the identical `(tenant_id,
    /// event_type, entity_id)` triple was appended within the dedupe
    /// window.
    pub async fn is_duplicate(
        &self,
        tenant_id: &str,
        event_type: &str,
        entity_id: &str,
    ) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM events
                WHERE tenant_id = $1
                  AND event_type = $2
                  AND entity_id = $3
                  AND created_at >= now() - ($4 || ' minutes')::interval
            )
            "#,
        )
        .bind(tenant_id)
        .bind(event_type)
        .bind(entity_id)
        .bind(DEDUPE_WINDOW_MINUTES.to_string())
        .fetch_one(&self.db_pool)
        .await?;

        Ok(row.0)
    }

    pub async fn mark_broadcast(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE events SET processing_mode = 'broadcast' WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    pub async fn mark_for_poll(&self, id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE events
            SET processing_mode = 'poll', retry_count = 0, next_retry_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    /// Claim up to `batch` events in `poll` state whose `next_retry_at`
    /// has passed, oldest first. At-least-once: no row locking is
    /// required by the spec, so concurrent pollers may double-claim
    /// under contention; handlers must be idempotent.
    pub async fn claim_pending(&self, batch: Option<i64>) -> Result<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            r#"
            SELECT
                id, tenant_id, event_type, entity_type, entity_id, actor_id,
                data, processing_mode, retry_count, next_retry_at, last_error,
                processed_at, created_at
            FROM events
            WHERE processing_mode = 'poll' AND next_retry_at <= now()
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(batch.unwrap_or(DEFAULT_CLAIM_BATCH))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(events)
    }

    pub async fn complete(&self, id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE events SET processing_mode = 'completed', processed_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    /// Increment `retry_count`; past `MAX_RETRY_COUNT` the event moves
    /// to the terminal `failed` state, otherwise it is rescheduled with
    /// exponential backoff `2^retry_count` seconds.
    pub async fn fail_attempt(&self, id: &str, error: &str) -> Result<()> {
        let row: (i32,) = sqlx::query_as("SELECT retry_count FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| Error::not_found("Event", id))?;

        let next_retry_count = row.0 + 1;

        if next_retry_count >= MAX_RETRY_COUNT {
            sqlx::query(
                "UPDATE events SET processing_mode = 'failed', retry_count = $1, last_error = $2 WHERE id = $3",
            )
            .bind(next_retry_count)
            .bind(error)
            .bind(id)
            .execute(&self.db_pool)
            .await?;
        } else {
            let next_retry_at = next_retry_at_for(next_retry_count);
            sqlx::query(
                r#"
                UPDATE events
                SET retry_count = $1, next_retry_at = $2, last_error = $3
                WHERE id = $4
                "#,
            )
            .bind(next_retry_count)
            .bind(next_retry_at)
            .bind(error)
            .bind(id)
            .execute(&self.db_pool)
            .await?;
        }

        Ok(())
    }
}

fn next_retry_at_for(retry_count: i32) -> DateTime<Utc> {
    let delay_secs = 2i64.saturating_pow(retry_count.max(0) as u32);
    Utc::now() + chrono::Duration::seconds(delay_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_backoff_doubles_each_attempt() {
        let first = next_retry_at_for(1);
        let second = next_retry_at_for(2);
        let now = Utc::now();

        assert!((first - now).num_seconds() >= 1);
        assert!((second - first).num_seconds() >= 0);
        assert!((second - now).num_seconds() > (first - now).num_seconds());
    }

    #[test]
    fn test_max_retry_count_is_ten() {
        assert_eq!(MAX_RETRY_COUNT, 10);
    }
}
