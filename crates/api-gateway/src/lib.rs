//! API Gateway Library
//!
//! Exposes the HTTP surface of the orchestration platform: webhook
//! registration (CRUD), the inbound webhook receiver that turns external
//! calls into platform events, and the outbound delivery worker that
//! relays platform events back out to registered webhooks.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
