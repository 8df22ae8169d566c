//! Data Transfer Objects (DTOs) for API requests and responses

pub mod common;
pub mod webhooks;

pub use common::*;
