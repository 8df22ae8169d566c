//! Observability core (spec §4.J): metrics, rate-limited structured
//! logging with PII redaction, and tracing helpers.

pub mod logging;
pub mod metrics_taxonomy;
pub mod redact;
pub mod tracing_support;

pub use logging::init_tracing;
pub use tracing_support::{instrument_result, should_sample};
