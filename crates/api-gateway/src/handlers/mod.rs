//! Request handlers for API endpoints

pub mod health;
pub mod helpers;
pub mod webhooks;
pub mod webhooks_inbound;

// Note: helpers module is not re-exported to avoid polluting the namespace.
// Import helpers directly: use crate::handlers::helpers::{...}
