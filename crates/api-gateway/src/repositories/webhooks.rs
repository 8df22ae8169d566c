//! Inbound webhook registration repository (spec §4.K, §4.I)

use chrono::Utc;
use shared::models::{InboundWebhook, WebhookDelivery};
use shared::{DbPool, Error, Result};
use uuid::Uuid;

#[derive(Clone)]
pub struct WebhookRepository {
    pool: DbPool,
}

impl WebhookRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new webhook row. `secret_ciphertext` is the AES-GCM
    /// encrypted secret; the plaintext never touches the database.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        tenant_id: &str,
        url: &str,
        secret_ciphertext: &[u8],
        events: &[String],
        form_id: Option<&str>,
    ) -> Result<InboundWebhook> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let webhook = sqlx::query_as::<_, InboundWebhook>(
            r#"
            INSERT INTO inbound_webhooks
                (id, tenant_id, url, secret_ciphertext, events, form_id,
                 status, health_status, consecutive_failures, success_count,
                 failure_count, average_latency_ms, last_success_at, deleted_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'active', 'unknown', 0, 0, 0, NULL, NULL, NULL, $7, $7)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(url)
        .bind(secret_ciphertext)
        .bind(serde_json::to_value(events).map_err(|e| Error::internal(e.to_string()))?)
        .bind(form_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(webhook)
    }

    /// Fetch a webhook scoped to its owning tenant, excluding soft-deleted rows.
    pub async fn find_by_id(&self, tenant_id: &str, id: &str) -> Result<Option<InboundWebhook>> {
        let webhook = sqlx::query_as::<_, InboundWebhook>(
            "SELECT * FROM inbound_webhooks WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(webhook)
    }

    /// Fetch a webhook by ID regardless of tenant, for the inbound receiver
    /// (which authenticates via the HMAC signature, not a tenant-scoped caller).
    pub async fn find_by_id_any_tenant(&self, id: &str) -> Result<Option<InboundWebhook>> {
        let webhook = sqlx::query_as::<_, InboundWebhook>(
            "SELECT * FROM inbound_webhooks WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(webhook)
    }

    pub async fn list_by_tenant(
        &self,
        tenant_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<InboundWebhook>, i64)> {
        let webhooks = sqlx::query_as::<_, InboundWebhook>(
            r#"
            SELECT * FROM inbound_webhooks
            WHERE tenant_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM inbound_webhooks WHERE tenant_id = $1 AND deleted_at IS NULL")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;

        Ok((webhooks, total))
    }

    pub async fn soft_delete(&self, tenant_id: &str, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE inbound_webhooks SET deleted_at = $1, updated_at = $1 WHERE id = $2 AND tenant_id = $3 AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record one outbound delivery attempt (spec §4.I). Always inserted,
    /// success or failure, so delivery history is complete.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_delivery(
        &self,
        webhook_id: &str,
        event_name: &str,
        payload_hash: &str,
        signature: &str,
        status: &str,
        status_code: Option<i32>,
        error_message: Option<&str>,
        response_time_ms: Option<i64>,
        attempt: i32,
    ) -> Result<WebhookDelivery> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let delivered_at = if status == "success" { Some(now) } else { None };

        let delivery = sqlx::query_as::<_, WebhookDelivery>(
            r#"
            INSERT INTO webhook_deliveries
                (id, webhook_id, event_name, payload_hash, signature, status,
                 status_code, error_message, response_time_ms, attempt, delivered_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(webhook_id)
        .bind(event_name)
        .bind(payload_hash)
        .bind(signature)
        .bind(status)
        .bind(status_code)
        .bind(error_message)
        .bind(response_time_ms)
        .bind(attempt)
        .bind(delivered_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(delivery)
    }

    /// Apply the health-transition state machine after a delivery attempt
    /// (spec §4.I): success resets the streak to `healthy`; failure
    /// increments it and escalates `health_status`, disabling the webhook
    /// outright once `consecutive_failures` reaches 10.
    pub async fn record_delivery_outcome(
        &self,
        webhook_id: &str,
        success: bool,
        latency_ms: i64,
    ) -> Result<()> {
        if success {
            let now = Utc::now();
            sqlx::query(
                r#"
                UPDATE inbound_webhooks
                SET consecutive_failures = 0,
                    health_status = 'healthy',
                    success_count = success_count + 1,
                    average_latency_ms = COALESCE((average_latency_ms + $2) / 2.0, $2),
                    last_success_at = $3,
                    updated_at = $3
                WHERE id = $1
                "#,
            )
            .bind(webhook_id)
            .bind(latency_ms as f64)
            .bind(now)
            .execute(&self.pool)
            .await?;
            return Ok(());
        }

        let row: (i32,) = sqlx::query_as(
            r#"
            UPDATE inbound_webhooks
            SET consecutive_failures = consecutive_failures + 1,
                failure_count = failure_count + 1,
                updated_at = $2
            WHERE id = $1
            RETURNING consecutive_failures
            "#,
        )
        .bind(webhook_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        let consecutive_failures = row.0;

        if consecutive_failures >= 10 {
            sqlx::query(
                "UPDATE inbound_webhooks SET health_status = 'unhealthy', status = 'disabled', updated_at = $2 WHERE id = $1",
            )
            .bind(webhook_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        } else if consecutive_failures >= 5 {
            sqlx::query("UPDATE inbound_webhooks SET health_status = 'degraded', updated_at = $2 WHERE id = $1")
                .bind(webhook_id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
        }
        // Below the degraded threshold, health_status is left as-is; an
        // already-healthy webhook shouldn't flip to 'unknown' on a single blip.

        Ok(())
    }
}
