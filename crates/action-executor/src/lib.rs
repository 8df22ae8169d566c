//! Action Executor library (spec §4.F, §4.G)
//!
//! Consumes action-chain jobs from the queue the event bus enqueues onto,
//! loads the triggering event and its trigger's actions, and runs the
//! chain to completion (or compensation) via an injected collaborator.

pub mod consumer;
pub mod dispatcher;
pub mod dlq;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod retry;
pub mod template;

pub use consumer::{JobConsumer, RedisJobConsumer};
pub use dispatcher::{ActionDispatcher, DispatchOutcome, HttpActionDispatcher};
pub use dlq::Dlq;
pub use error::{WorkerError, WorkerResult};
pub use executor::ChainExecutor;
