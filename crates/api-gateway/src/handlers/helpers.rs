//! Common Handler Helpers
//!
//! Reusable helper functions that consolidate common patterns found
//! across handlers: validation, error responses, request context.

use actix_web::{HttpRequest, HttpResponse};
use validator::Validate;

use crate::models::ErrorResponse;

/// Validate a request struct or return 400 Bad Request
pub fn validate_request<T: Validate>(req: &T) -> Result<(), HttpResponse> {
    req.validate().map_err(|e| {
        HttpResponse::BadRequest().json(ErrorResponse::new(
            "validation_error",
            format!("Validation failed: {}", e),
        ))
    })
}

/// Handle database errors with consistent logging and response
pub fn handle_db_error<T, E: std::fmt::Display>(
    result: Result<T, E>,
    context: &str,
) -> Result<T, HttpResponse> {
    result.map_err(|e| {
        tracing::error!("Database error during {}: {}", context, e);
        HttpResponse::InternalServerError().json(ErrorResponse::new(
            "internal_error",
            format!("Failed to {}", context),
        ))
    })
}

/// Convert Option<T> to T or return 404 Not Found
pub fn require_found<T>(option: Option<T>, resource: &str) -> Result<T, HttpResponse> {
    option.ok_or_else(|| {
        HttpResponse::NotFound().json(ErrorResponse::new(
            "not_found",
            format!("{} not found", resource),
        ))
    })
}

/// Return a 403 Forbidden response with a custom message
pub fn forbidden(message: &str) -> HttpResponse {
    HttpResponse::Forbidden().json(ErrorResponse::new("forbidden", message))
}

/// Return a 400 Bad Request response with a custom message
pub fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse::new("bad_request", message))
}

/// Return a safe internal server error that doesn't leak implementation details
///
/// SECURITY: Use this for errors where the cause should never be exposed to
/// clients, such as database errors, configuration issues, or collaborator
/// failures.
pub fn safe_internal_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse::new(
        "internal_error",
        "An internal error occurred. Please try again later.",
    ))
}

/// Structured request metadata for audit logging
pub struct RequestContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub endpoint: String,
}

impl RequestContext {
    pub fn ip_str(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    pub fn user_agent_str(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn endpoint_str(&self) -> &str {
        &self.endpoint
    }
}

/// Extract request context from HTTP request
pub fn extract_request_context(req: &HttpRequest) -> RequestContext {
    let ip = req.connection_info().realip_remote_addr().map(|s| s.to_string());

    let user_agent = req.headers().get("user-agent").and_then(|h| h.to_str().ok()).map(|s| s.to_string());

    let endpoint = req.path().to_string();

    RequestContext { ip, user_agent, endpoint }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_found_some() {
        let result: Result<i32, HttpResponse> = require_found(Some(42), "Widget");
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_require_found_none_is_404() {
        let result: Result<i32, HttpResponse> = require_found(None, "Widget");
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().status(), actix_web::http::StatusCode::NOT_FOUND);
    }
}
