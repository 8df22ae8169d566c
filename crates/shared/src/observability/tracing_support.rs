//! Tracing helpers (spec §4.J)
//!
//! A sampling decision function and an `instrument_result` helper that
//! wraps a fallible async operation in a span, always closing it and
//! recording success/error status — the shape `#[tracing::instrument]`
//! alone does not give you for error-status recording.

use std::future::Future;
use tracing::Span;
use tracing::Instrument;

/// Span names that are always sampled regardless of `sample_rate`.
const ALWAYS_SAMPLED: &[&str] = &["event.emit", "action.execute", "trigger.match"];

/// Attribute values longer than this are truncated with a trailing
/// marker before being attached to a span.
const MAX_ATTR_BYTES: usize = 10 * 1024;

/// Decide whether a span should be sampled. Spans carrying an error, or
/// named among the always-sampled set, are always kept; otherwise kept
/// with probability `sample_rate` using `deterministic_hash` so the
/// decision is reproducible for a given `trace_key`.
pub fn should_sample(name: &str, has_error: bool, sample_rate: f64, trace_key: &str) -> bool {
    if has_error || ALWAYS_SAMPLED.contains(&name) {
        return true;
    }
    let hash = deterministic_hash(trace_key);
    // Map hash into [0, 1) and compare against sample_rate.
    (hash as f64 / u64::MAX as f64) < sample_rate.clamp(0.0, 1.0)
}

fn deterministic_hash(s: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Truncate an attribute value to `MAX_ATTR_BYTES`, appending the
/// spec-mandated marker when truncation occurred.
pub fn truncate_attr(value: &str) -> String {
    if value.len() <= MAX_ATTR_BYTES {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(MAX_ATTR_BYTES).collect();
    truncated.push_str("… [truncated]");
    truncated
}

/// Run `op` inside `span`, always closing the span, recording
/// `otel.status_code = ok` on success and `error = true` plus the
/// (redacted, truncated) error message on failure.
pub async fn instrument_result<T, E, F>(span: Span, op: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let result = op.instrument(span.clone()).await;

    match &result {
        Ok(_) => {
            span.record("otel.status_code", "ok");
        }
        Err(e) => {
            let msg = crate::observability::redact::redact_text(&truncate_attr(&e.to_string()));
            span.record("error", true);
            span.record("error.message", msg.as_str());
            span.record("otel.status_code", "error");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_sampled_names_bypass_rate() {
        assert!(should_sample("action.execute", false, 0.0, "k1"));
        assert!(should_sample("trigger.match", false, 0.0, "k2"));
    }

    #[test]
    fn test_error_spans_always_sampled() {
        assert!(should_sample("anything.else", true, 0.0, "k3"));
    }

    #[test]
    fn test_sample_rate_zero_drops_non_special_spans() {
        assert!(!should_sample("some.span", false, 0.0, "key-does-not-matter"));
    }

    #[test]
    fn test_sample_rate_one_keeps_everything() {
        assert!(should_sample("some.span", false, 1.0, "any-key"));
    }

    #[test]
    fn test_truncate_attr_adds_marker_only_when_needed() {
        let short = "hello";
        assert_eq!(truncate_attr(short), short);

        let long = "x".repeat(20_000);
        let truncated = truncate_attr(&long);
        assert!(truncated.ends_with("… [truncated]"));
        assert!(truncated.len() < long.len());
    }
}
