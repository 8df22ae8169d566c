//! Inbound webhook receiver (spec §4.H)
//!
//! `POST /webhooks/inbound/{tenant_id}/{webhook_id}` turns a signed,
//! rate-limited external call into a platform event. Every failure
//! branch returns a generic `{error}` body; none of them echo payload
//! fragments back to the caller.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use event_bus::EventBus;
use serde_json::Value;
use shared::models::{NewEvent, WebhookStatus};
use shared::redis::{cache, EntityCache, RateLimiter};
use shared::{signature, Config};
use uuid::Uuid;

use crate::models::common::ErrorResponse;
use crate::repositories::WebhookRepository;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const MAX_NESTING_DEPTH: usize = 64;

fn error_response(status: actix_web::http::StatusCode, code: &str, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse::new(code, message))
}

/// `POST /webhooks/inbound/{tenant_id}/{webhook_id}`
pub async fn receive_inbound_webhook(
    path: web::Path<(String, String)>,
    req: HttpRequest,
    body: web::Bytes,
    repo: web::Data<WebhookRepository>,
    rate_limiter: web::Data<RateLimiter>,
    cache: web::Data<EntityCache>,
    config: web::Data<Config>,
    event_bus: web::Data<EventBus>,
) -> impl Responder {
    let (tenant_id, webhook_id) = path.into_inner();

    // Step 1: UUID form check
    if Uuid::parse_str(&webhook_id).is_err() {
        return error_response(actix_web::http::StatusCode::BAD_REQUEST, "bad_request", "invalid UUID");
    }

    // Step 2: lookup + tenant/status check
    let webhook = match repo.find_by_id_any_tenant(&webhook_id).await {
        Ok(Some(w)) => w,
        Ok(None) => {
            return error_response(actix_web::http::StatusCode::NOT_FOUND, "not_found", "webhook not found")
        }
        Err(e) => {
            tracing::error!(error = %e.safe_message(), "failed to look up inbound webhook");
            return error_response(
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred",
            );
        }
    };

    if webhook.tenant_id != tenant_id {
        return error_response(actix_web::http::StatusCode::FORBIDDEN, "forbidden", "organization mismatch");
    }

    match webhook.status() {
        WebhookStatus::Disabled => {
            return error_response(actix_web::http::StatusCode::FORBIDDEN, "forbidden", "webhook is disabled")
        }
        WebhookStatus::Paused => {
            return error_response(actix_web::http::StatusCode::FORBIDDEN, "forbidden", "webhook is paused")
        }
        WebhookStatus::Active => {}
    }

    // Step 3: rate limit
    let rate_result = match rate_limiter.check_webhook(&webhook_id).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e.safe_message(), "rate limiter error");
            return error_response(
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred",
            );
        }
    };
    if !rate_result.allowed {
        return HttpResponse::TooManyRequests()
            .append_header(("Retry-After", rate_result.retry_after.to_string()))
            .json(ErrorResponse::new("rate_limited", "rate limit exceeded"));
    }

    // Step 4: signature
    let signature_header = req
        .headers()
        .get("X-Signature")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let key = signature::derive_key(&config.encryption.key);
    let secret = match signature::decrypt_secret(&webhook.secret_ciphertext, &key) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to decrypt webhook secret");
            return error_response(
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred",
            );
        }
    };

    if !signature::verify(&body, signature_header, &secret) {
        return error_response(actix_web::http::StatusCode::UNAUTHORIZED, "unauthorized", "invalid signature");
    }

    // Step 5: body size / depth / shape
    if body.len() > MAX_BODY_BYTES {
        return error_response(actix_web::http::StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", "body too large");
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => {
            return error_response(actix_web::http::StatusCode::BAD_REQUEST, "bad_request", "malformed JSON body")
        }
    };

    if value_depth(&payload) > MAX_NESTING_DEPTH {
        return error_response(actix_web::http::StatusCode::BAD_REQUEST, "bad_request", "nesting too deep");
    }

    let Some(event_name) = payload.get("event").and_then(Value::as_str) else {
        return error_response(actix_web::http::StatusCode::BAD_REQUEST, "bad_request", "missing 'event' field");
    };
    let event_name = event_name.to_string();

    // Step 6: cache the payload snapshot
    let timestamp = payload
        .get("timestamp")
        .and_then(Value::as_i64)
        .unwrap_or_else(|| chrono::Utc::now().timestamp());

    if cache::should_cache_body(body.len()) {
        let cache_key = cache::inbound_payload_key(&tenant_id, &webhook_id, timestamp);
        if let Err(e) = cache.try_set(&cache_key, &payload).await {
            tracing::error!(error = %e, "failed to write inbound payload snapshot to cache");
            return error_response(
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                "cache_unavailable",
                "cache unavailable",
            );
        }
    }

    // Step 7: emit event
    let new_event = NewEvent {
        tenant_id: tenant_id.clone(),
        event_type: event_name.clone(),
        entity_type: webhook.form_id.clone().unwrap_or_else(|| "webhook".to_string()),
        entity_id: webhook_id.clone(),
        actor_id: None,
        data: payload,
    };

    if let Err(e) = event_bus.publish(new_event).await {
        if e.kind() == shared::ErrorKind::DuplicateEvent {
            // Duplicate within the dedupe window still counts as processed (spec §4.D).
        } else {
            tracing::error!(error = %e.safe_message(), "failed to publish inbound webhook event");
            return error_response(
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred",
            );
        }
    }

    // Step 8: response
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "webhook_id": webhook_id,
        "status": "processed",
    }))
}

fn value_depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(value_depth).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(value_depth).max().unwrap_or(0),
        _ => 0,
    }
}
