//! Route configuration for the API

use actix_web::web;

use crate::handlers;

/// Configure all routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health::health_check))
            .service(
                web::scope("/tenants/{tenant_id}/webhooks")
                    .route("", web::post().to(handlers::webhooks::create_webhook))
                    .route("", web::get().to(handlers::webhooks::list_webhooks))
                    .route("/{webhook_id}", web::get().to(handlers::webhooks::get_webhook))
                    .route("/{webhook_id}", web::delete().to(handlers::webhooks::delete_webhook)),
            ),
    )
    .service(
        web::scope("/webhooks/inbound/{tenant_id}/{webhook_id}")
            .route("", web::post().to(handlers::webhooks_inbound::receive_inbound_webhook)),
    )
    .route("/metrics", web::get().to(crate::middleware::metrics_handler));
}
