//! Event Bus library (spec §4.C, §4.D, §4.E)
//!
//! Provides the Event Store, Trigger Matcher, action-chain job queue,
//! and the `EventBus` struct tying them together behind `publish`/
//! `subscribe`, plus the Redis-backed listener and polling fallback
//! that recover events the broadcast path missed.

pub mod bus;
pub mod event_store;
pub mod listener;
pub mod polling_fallback;
pub mod queue;
pub mod subscription;
pub mod trigger_engine;

pub use bus::{EventBus, EVENTS_CHANNEL};
pub use event_store::EventStore;
pub use listener::EventListener;
pub use polling_fallback::PollingFallback;
pub use queue::{JobQueue, RedisJobQueue};
pub use subscription::{Handler, SubscriptionRegistry};
pub use trigger_engine::TriggerMatcher;
