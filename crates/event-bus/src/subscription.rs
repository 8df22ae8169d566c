//! In-process subscription registry (spec §4.D)
//!
//! `subscribe(pattern, handler)` where pattern is either an exact
//! `event_type` or a glob with `*` (translated to an anchored regex).
//! Handlers are invoked per matching message; handler errors are logged
//! but never abort fan-out to the remaining handlers.

use dashmap::DashMap;
use regex::Regex;
use shared::models::Event;
use std::sync::Arc;

pub type Handler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;
pub type HandlerFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = shared::Result<()>> + Send>>;

/// Translate a subscription pattern into an anchored regex. A pattern
/// with no `*` is matched literally (exact event_type).
fn pattern_to_regex(pattern: &str) -> Regex {
    if !pattern.contains('*') {
        let escaped = regex::escape(pattern);
        return Regex::new(&format!("^{}$", escaped)).expect("literal pattern is valid regex");
    }

    let mut anchored = String::from("^");
    for part in pattern.split('*') {
        anchored.push_str(&regex::escape(part));
        anchored.push_str(".*");
    }
    anchored.truncate(anchored.len() - 2); // drop the trailing ".*" from the split sentinel
    anchored.push('$');
    Regex::new(&anchored).unwrap_or_else(|_| Regex::new("$^").unwrap())
}

struct Subscription {
    pattern: String,
    regex: Regex,
    handler: Handler,
}

/// Concurrent map of subscriptions, fanned out to on every bus message.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    subscriptions: Arc<DashMap<u64, Subscription>>,
    next_id: Arc<std::sync::atomic::AtomicU64>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, pattern: &str, handler: Handler) {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.subscriptions.insert(
            id,
            Subscription {
                pattern: pattern.to_string(),
                regex: pattern_to_regex(pattern),
                handler,
            },
        );
    }

    /// Invoke every handler whose pattern matches `event.event_type`.
    /// Handler errors are logged, never propagated.
    pub async fn dispatch(&self, event: &Event) {
        let matching: Vec<(String, Handler)> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.regex.is_match(&event.event_type))
            .map(|entry| (entry.pattern.clone(), entry.handler.clone()))
            .collect();

        for (pattern, handler) in matching {
            if let Err(e) = handler(event.clone()).await {
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    pattern = %pattern,
                    error = %e.safe_message(),
                    "subscriber handler failed"
                );
            }
        }
    }
}
