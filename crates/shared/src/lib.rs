//! Shared library for the event-trigger orchestration core
//!
//! This crate provides common functionality used across all backend
//! services:
//! - Database connection pooling and utilities
//! - Domain models matching the PostgreSQL schema
//! - Error taxonomy (spec §7)
//! - Configuration management
//! - Observability core: logging, PII redaction, tracing (spec §4.J)
//! - Signature/secret facade (spec §4.B)
//! - Shared value-tree walker (spec §9)
//! - Redis-backed cache and rate limiter helpers
//! - Job definitions shared between the event bus and action executor

pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod models;
pub mod observability;
pub mod redis;
pub mod signature;
pub mod value_tree;

// Re-export commonly used types
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::Config;
pub use db::DbPool;
pub use error::{Error, ErrorKind, Result};
pub use jobs::{ActionJob, ACTION_JOBS_DLQ, ACTION_JOBS_QUEUE};
pub use models::ActionType;
pub use observability::init_tracing;
