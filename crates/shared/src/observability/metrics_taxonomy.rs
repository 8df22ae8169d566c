//! Bounded-cardinality metric labels (spec §4.J, invariant 8)
//!
//! Every label value reaching the metrics backend must come from a
//! fixed, small set. Free-form event types and error messages are
//! normalized into bucket keys here before being passed to a `metrics`
//! counter/histogram/gauge label.

/// Event types recognized verbatim; anything else falls into a bucket.
const KNOWN_EVENT_TYPES: &[&str] = &[
    "form.submitted",
    "form.approved",
    "form.rejected",
    "form.updated",
    "form.deleted",
    "user.created",
    "user.updated",
    "user.deleted",
    "workflow.started",
    "workflow.completed",
    "workflow.failed",
    "workflow.state_changed",
    "integration.synced",
    "integration.sync_failed",
    "webhook.received",
    "webhook.delivered",
    "webhook.failed",
    "trigger.matched",
    "trigger.created",
    "trigger.updated",
    "trigger.deleted",
    "action.executed",
    "action.failed",
    "dlq.entry_added",
    "dlq.entry_resolved",
];

/// Normalize an arbitrary event type string into one of ~25 fixed
/// metric label keys plus a small set of catch-all buckets, to keep
/// label cardinality bounded (spec §8 invariant 8: event-type ≤ 100).
pub fn normalize_event_type(event_type: &str) -> &'static str {
    if let Some(known) = KNOWN_EVENT_TYPES.iter().find(|&&k| k == event_type) {
        return known;
    }

    if event_type.starts_with("custom.") {
        return "custom_event";
    }
    if event_type.contains('{') || event_type.contains("${") {
        return "dynamic_event";
    }
    if looks_like_uuid(event_type) {
        return "generic_uuid_event";
    }
    if event_type.chars().any(|c| c.is_ascii_digit())
        && event_type.chars().filter(|c| c.is_ascii_digit()).count() >= 4
    {
        return "generic_random_event";
    }
    if let Some((category, _)) = event_type.split_once('.') {
        return category_other(category);
    }
    "unknown_event"
}

fn category_other(category: &str) -> &'static str {
    match category {
        "form" => "form.other",
        "user" => "user.other",
        "workflow" => "workflow.other",
        "integration" => "integration.other",
        "webhook" => "webhook.other",
        "trigger" => "trigger.other",
        "action" => "action.other",
        "dlq" => "dlq.other",
        _ => "unknown_event",
    }
}

fn looks_like_uuid(s: &str) -> bool {
    let stripped: String = s.chars().filter(|c| *c != '-').collect();
    stripped.len() == 32 && stripped.chars().all(|c| c.is_ascii_hexdigit())
}

/// Normalize an error description into one of a fixed set of error
/// taxonomy keys (spec §8 invariant 8: error-type ≤ 50).
pub fn normalize_error_name(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        "network_timeout"
    } else if lower.contains("connection refused") {
        "connection_refused"
    } else if lower.contains("connection reset") {
        "connection_reset"
    } else if lower.contains("dns") {
        "dns_resolution_failed"
    } else if lower.contains("validation") {
        "validation_error"
    } else if lower.contains("database") || lower.contains("sql") {
        "database_error"
    } else if lower.contains("unauthorized") || lower.contains("401") {
        "auth_unauthorized"
    } else if lower.contains("forbidden") || lower.contains("403") {
        "auth_forbidden"
    } else if lower.contains("rate limit") || lower.contains("429") {
        "rate_limit_exceeded"
    } else {
        "unknown_error"
    }
}

/// Record a successful action execution.
pub fn record_action_success(action_type: &str) {
    metrics::counter!("action_executions_total", "type" => action_type.to_string(), "status" => "success").increment(1);
}

/// Record a failed action execution (error message normalized before
/// being used as a label).
pub fn record_action_failure(action_type: &str, error: &str) {
    metrics::counter!(
        "action_executions_total",
        "type" => action_type.to_string(),
        "status" => "failed"
    )
    .increment(1);
    metrics::counter!(
        "action_errors_total",
        "type" => action_type.to_string(),
        "error" => normalize_error_name(error)
    )
    .increment(1);
}

pub fn record_action_retry(action_type: &str) {
    metrics::counter!("action_retries_total", "type" => action_type.to_string()).increment(1);
}

pub fn record_action_compensation(action_type: &str) {
    metrics::counter!("action_compensations_total", "type" => action_type.to_string())
        .increment(1);
}

pub fn record_dlq_size(size: u64) {
    metrics::gauge!("dlq_size").set(size as f64);
}

pub fn record_rate_limit_hit() {
    metrics::counter!("rate_limit_hits_total").increment(1);
}
