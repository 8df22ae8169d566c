//! Repository layer for database access

pub mod webhooks;

pub use webhooks::WebhookRepository;
