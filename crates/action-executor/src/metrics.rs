//! Metrics for the action executor (spec §4.F telemetry, §4.J)
//!
//! Uses the `metrics` facade rather than a direct `prometheus::Registry`,
//! matching the event bus crate; an exporter is installed once at process
//! startup by `main.rs`. Label values are bounded by the normalized
//! taxonomies in `shared::observability` before they reach here.

use metrics::{counter, gauge, histogram};

pub fn record_action_execution(action_type: &str, status: &str) {
    counter!("action_executions_total", "type" => action_type.to_string(), "status" => status.to_string()).increment(1);
}

pub fn record_retry(action_type: &str) {
    counter!("action_retries_total", "type" => action_type.to_string()).increment(1);
}

pub fn record_compensation(action_type: &str) {
    counter!("action_compensations_total", "type" => action_type.to_string()).increment(1);
}

pub fn record_job_dlq(action_type: &str) {
    counter!("action_executions_total", "type" => action_type.to_string(), "status" => "dlq".to_string()).increment(1);
}

pub fn observe_action_duration(action_type: &str, duration_secs: f64) {
    histogram!("action_execution_duration_seconds", "type" => action_type.to_string()).record(duration_secs);
}

pub fn set_dlq_size(size: u64) {
    gauge!("action_dlq_size").set(size as f64);
}

pub fn set_queue_depth(depth: u64) {
    gauge!("action_queue_depth").set(depth as f64);
}
