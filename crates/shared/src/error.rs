//! Error taxonomy for the orchestration core (spec §7)
//!
//! Every variant maps onto one of the ten kinds the HTTP layer and the
//! executor branch on. Variants carry enough context to build a safe,
//! non-leaking external message while the `Debug`/`tracing` path still
//! sees the full chain.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The ten error kinds from spec §7. Handlers and the executor switch
/// on this rather than matching `Error` variants directly, since a kind
/// can be produced by more than one variant (e.g. `Transport` from both
/// a `reqwest` error and a `redis` connection error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DuplicateEvent,
    Validation,
    Auth,
    NotFound,
    RateLimited,
    PayloadTooLarge,
    Timeout,
    CircuitOpen,
    Transport,
    Integration,
    Internal,
}

impl ErrorKind {
    /// Retryable classification used by the circuit breaker and the
    /// action executor's backoff loop. Validation/Auth/NotFound/
    /// Integration (remote 4xx) are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::Transport | ErrorKind::CircuitOpen
        )
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::DuplicateEvent => 200,
            ErrorKind::Validation => 400,
            ErrorKind::Auth => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::RateLimited => 429,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::Timeout => 504,
            ErrorKind::CircuitOpen => 503,
            ErrorKind::Transport => 502,
            ErrorKind::Integration => 502,
            ErrorKind::Internal => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Duplicate event: {0}")]
    DuplicateEvent(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication/authorization error: {0}")]
    Auth(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Circuit breaker open, retry after {retry_after_secs}s")]
    CircuitOpen { retry_after_secs: i64 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Integration error: {0}")]
    Integration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DuplicateEvent(_) => ErrorKind::DuplicateEvent,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Auth(_) => ErrorKind::Auth,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Integration(_) => ErrorKind::Integration,
            Error::Database(_) | Error::Redis(_) | Error::Config(_) | Error::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Message safe to return to an external caller: no payload
    /// contents, no file paths, no internal stack context.
    pub fn safe_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "an internal error occurred".to_string(),
            _ => sanitize(&self.to_string()),
        }
    }
}

fn sanitize(msg: &str) -> String {
    let truncated: String = msg.chars().take(200).collect();
    truncated
        .chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_retryable_classification() {
        assert!(ErrorKind::Transport.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::CircuitOpen.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::Integration.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ErrorKind::RateLimited.http_status(), 429);
        assert_eq!(ErrorKind::PayloadTooLarge.http_status(), 413);
        assert_eq!(ErrorKind::Auth.http_status(), 401);
    }

    #[test]
    fn test_internal_safe_message_never_leaks() {
        let err = Error::internal("db password is hunter2 at /etc/secrets/db.conf");
        assert_eq!(err.safe_message(), "an internal error occurred");
    }

    #[test]
    fn test_validation_safe_message_is_truncated_and_sanitized() {
        let long = "x".repeat(500);
        let err = Error::validation(long);
        assert!(err.safe_message().len() <= 200);
    }

    #[test]
    fn test_not_found_kind() {
        let err = Error::not_found("Trigger", "abc");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
