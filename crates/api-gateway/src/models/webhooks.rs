//! Webhook registration DTOs (spec §4.K)

use serde::{Deserialize, Serialize};
use shared::models::InboundWebhook;
use validator::Validate;

/// Body of `POST /api/v1/webhooks`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWebhookApiRequest {
    #[validate(url)]
    pub url: String,
    #[validate(length(min = 1))]
    pub events: Vec<String>,
    pub form_id: Option<String>,
}

/// A registered webhook as returned to the tenant. Never carries the
/// secret after creation; `secret` is only populated by `create`.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub id: String,
    pub url: String,
    pub events: Vec<String>,
    pub form_id: Option<String>,
    pub status: String,
    pub health_status: String,
    pub consecutive_failures: i32,
    pub success_count: i64,
    pub failure_count: i64,
    pub average_latency_ms: Option<f64>,
    pub last_success_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// Plaintext secret, present only in the response to `create`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl WebhookResponse {
    pub fn from_webhook(webhook: &InboundWebhook, secret: Option<String>) -> Self {
        Self {
            id: webhook.id.clone(),
            url: webhook.url.clone(),
            events: webhook.events.clone(),
            form_id: webhook.form_id.clone(),
            status: webhook.status().to_string(),
            health_status: webhook.health_status().to_string(),
            consecutive_failures: webhook.consecutive_failures,
            success_count: webhook.success_count,
            failure_count: webhook.failure_count,
            average_latency_ms: webhook.average_latency_ms,
            last_success_at: webhook.last_success_at,
            created_at: webhook.created_at,
            updated_at: webhook.updated_at,
            secret,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_omitted_when_none() {
        let webhook = sample_webhook();
        let response = WebhookResponse::from_webhook(&webhook, None);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("\"secret\""));
    }

    #[test]
    fn test_secret_included_on_create() {
        let webhook = sample_webhook();
        let response = WebhookResponse::from_webhook(&webhook, Some("whsec_abc".to_string()));
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("whsec_abc"));
    }

    fn sample_webhook() -> InboundWebhook {
        let now = chrono::Utc::now();
        InboundWebhook {
            id: "wh_1".to_string(),
            tenant_id: "tenant_1".to_string(),
            url: "https://example.com/hook".to_string(),
            secret_ciphertext: vec![0u8; 28],
            events: vec!["form.submitted".to_string()],
            form_id: None,
            status: "active".to_string(),
            health_status: "unknown".to_string(),
            consecutive_failures: 0,
            success_count: 0,
            failure_count: 0,
            average_latency_ms: None,
            last_success_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
