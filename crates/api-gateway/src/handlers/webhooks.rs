//! Webhook registration CRUD handlers (spec §4.K)

use actix_web::{web, HttpResponse, Responder};
use shared::redis::EntityCache;
use shared::{signature, Config};

use crate::handlers::helpers::{bad_request, handle_db_error, require_found, validate_request};
use crate::models::common::{ErrorResponse, PaginatedResponse, PaginationMeta, PaginationParams};
use crate::models::webhooks::{CreateWebhookApiRequest, WebhookResponse};
use crate::repositories::WebhookRepository;
use crate::services::url_guard;

/// `POST /api/v1/tenants/{tenant_id}/webhooks`
pub async fn create_webhook(
    path: web::Path<String>,
    body: web::Json<CreateWebhookApiRequest>,
    repo: web::Data<WebhookRepository>,
    config: web::Data<Config>,
) -> impl Responder {
    if let Err(response) = validate_request(&*body) {
        return response;
    }

    let tenant_id = path.into_inner();
    let request = body.into_inner();

    if let Err(e) = url_guard::validate_webhook_url(&request.url, &config.webhook_guard.platform_domains) {
        return bad_request(&e.to_string());
    }

    let plaintext_secret = signature::generate_secret();
    let key = signature::derive_key(&config.encryption.key);
    let ciphertext = match signature::encrypt_secret(plaintext_secret.as_bytes(), &key) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to encrypt webhook secret");
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::new("internal_error", "Failed to register webhook"));
        }
    };

    let created = match repo
        .create(&tenant_id, &request.url, &ciphertext, &request.events, request.form_id.as_deref())
        .await
    {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(error = %e.safe_message(), "failed to create webhook");
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::new("internal_error", "Failed to register webhook"));
        }
    };

    HttpResponse::Created().json(WebhookResponse::from_webhook(&created, Some(plaintext_secret)))
}

/// `GET /api/v1/tenants/{tenant_id}/webhooks`
pub async fn list_webhooks(
    path: web::Path<String>,
    query: web::Query<PaginationParams>,
    repo: web::Data<WebhookRepository>,
) -> impl Responder {
    if let Err(e) = query.validate() {
        return bad_request(&e.to_string());
    }

    let tenant_id = path.into_inner();
    let (webhooks, total) = match handle_db_error(
        repo.list_by_tenant(&tenant_id, query.limit, query.offset).await,
        "list webhooks",
    ) {
        Ok(v) => v,
        Err(response) => return response,
    };

    let data = webhooks.iter().map(|w| WebhookResponse::from_webhook(w, None)).collect();

    HttpResponse::Ok().json(PaginatedResponse {
        data,
        pagination: PaginationMeta::new(total, query.limit, query.offset),
    })
}

/// `GET /api/v1/tenants/{tenant_id}/webhooks/{webhook_id}`
pub async fn get_webhook(
    path: web::Path<(String, String)>,
    repo: web::Data<WebhookRepository>,
) -> impl Responder {
    let (tenant_id, webhook_id) = path.into_inner();

    let found = match handle_db_error(repo.find_by_id(&tenant_id, &webhook_id).await, "fetch webhook") {
        Ok(v) => v,
        Err(response) => return response,
    };

    match require_found(found, "Webhook") {
        Ok(webhook) => HttpResponse::Ok().json(WebhookResponse::from_webhook(&webhook, None)),
        Err(response) => response,
    }
}

/// `DELETE /api/v1/tenants/{tenant_id}/webhooks/{webhook_id}`
pub async fn delete_webhook(
    path: web::Path<(String, String)>,
    repo: web::Data<WebhookRepository>,
    cache: web::Data<EntityCache>,
) -> impl Responder {
    let (tenant_id, webhook_id) = path.into_inner();

    let deleted = match handle_db_error(repo.soft_delete(&tenant_id, &webhook_id).await, "delete webhook") {
        Ok(v) => v,
        Err(response) => return response,
    };

    if !deleted {
        return HttpResponse::NotFound().json(ErrorResponse::new("not_found", "Webhook not found"));
    }

    cache.delete(&shared::redis::cache::webhook_key_by_id(&webhook_id)).await;

    HttpResponse::NoContent().finish()
}
