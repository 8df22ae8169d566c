//! Business logic services for the API gateway
//!
//! This module contains services that encapsulate business logic
//! separate from HTTP handlers and database access.

pub mod outbound_delivery;
pub mod url_guard;

pub use outbound_delivery::OutboundDeliveryWorker;
pub use url_guard::{validate_webhook_url, UrlGuardError};
