//! Event Bus (spec §4.D)
//!
//! Ties together the Event Store, the Trigger Matcher, the action-chain
//! job queue, and an in-process subscription registry behind a single
//! `publish`/`subscribe` surface. Broadcast to cross-process subscribers
//! rides a Redis pub/sub channel named `events`; best-effort delivery is
//! protected by a circuit breaker so a stalled Redis doesn't block
//! publishers — it only pushes the event onto the poll path instead.

use crate::event_store::EventStore;
use crate::queue::JobQueue;
use crate::subscription::SubscriptionRegistry;
use crate::trigger_engine::TriggerMatcher;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use shared::jobs::ActionJob;
use shared::models::{Event, NewEvent};
use shared::value_tree::strip_bidi_controls;
use shared::{CircuitBreaker, Error, Result};
use std::sync::Arc;

/// Name of the Redis pub/sub channel carrying JSON-encoded `Event`
/// messages to cross-process subscribers (spec §6).
pub const EVENTS_CHANNEL: &str = "events";

#[derive(Clone)]
pub struct EventBus {
    store: EventStore,
    matcher: TriggerMatcher,
    queue: Arc<dyn JobQueue>,
    registry: SubscriptionRegistry,
    redis: ConnectionManager,
    breaker: CircuitBreaker,
}

impl EventBus {
    pub fn new(
        store: EventStore,
        matcher: TriggerMatcher,
        queue: Arc<dyn JobQueue>,
        redis: ConnectionManager,
    ) -> Self {
        Self {
            store,
            matcher,
            queue,
            registry: SubscriptionRegistry::new(),
            redis,
            breaker: CircuitBreaker::with_defaults("event-bus-broadcast"),
        }
    }

    /// Register an in-process handler for events whose `event_type`
    /// matches `pattern` (exact string or `*`-glob).
    pub fn subscribe(&self, pattern: &str, handler: crate::subscription::Handler) {
        self.registry.subscribe(pattern, handler);
    }

    /// Publish algorithm (spec §4.D):
    /// 1. sanitize `data` of bidi/embedding controls,
    /// 2. dedupe, failing with `DuplicateEvent` on a hit,
    /// 3. persist through the Event Store,
    /// 4. match and enqueue triggers before the event is marked handled,
    /// 5. best-effort broadcast through the circuit breaker,
    /// 6. mark `broadcast` on success, `poll` on any broadcast failure.
    ///
    /// Trigger matching runs before the broadcast/poll decision: if the
    /// matcher query itself fails, the event is left (explicitly marked)
    /// `poll` and the error propagates, so the poller retries matching
    /// later instead of the event's triggers being silently dropped.
    pub async fn publish(&self, mut new_event: NewEvent) -> Result<Event> {
        new_event.data = strip_bidi_controls(&new_event.data);

        if self
            .store
            .is_duplicate(&new_event.tenant_id, &new_event.event_type, &new_event.entity_id)
            .await?
        {
            return Err(Error::DuplicateEvent(format!(
                "{}/{}/{}",
                new_event.tenant_id, new_event.event_type, new_event.entity_id
            )));
        }

        let event = self.store.append(new_event).await?;

        if let Err(e) = self.enqueue_matching_triggers(&event).await {
            tracing::error!(
                event_id = %event.id,
                error = %e.safe_message(),
                "trigger matching failed, leaving event for poll fallback"
            );
            self.store.mark_for_poll(&event.id).await?;
            return Err(e);
        }

        match self.broadcast(&event).await {
            Ok(()) => {
                self.store.mark_broadcast(&event.id).await?;
            }
            Err(e) => {
                tracing::warn!(
                    event_id = %event.id,
                    error = %e.safe_message(),
                    "broadcast failed, falling back to poll path"
                );
                self.store.mark_for_poll(&event.id).await?;
            }
        }

        Ok(event)
    }

    async fn broadcast(&self, event: &Event) -> Result<()> {
        let event = event.clone();
        let mut redis = self.redis.clone();
        let registry = self.registry.clone();

        self.breaker
            .execute(|| async move {
                let payload = serde_json::to_string(&event)
                    .map_err(|e| Error::internal(format!("failed to serialize event: {}", e)))?;

                redis
                    .publish::<_, _, ()>(EVENTS_CHANNEL, payload)
                    .await
                    .map_err(|e| Error::internal(format!("redis publish failed: {}", e)))?;

                registry.dispatch(&event).await;

                Ok(())
            })
            .await
    }

    /// Load matching triggers (spec §4.E) and enqueue one action-chain
    /// job per match. Matching is best-effort per trigger: a failure to
    /// enqueue one trigger's job does not prevent the others from
    /// running.
    async fn enqueue_matching_triggers(&self, event: &Event) -> Result<()> {
        let triggers = self.matcher.matching_triggers(event).await?;

        for trigger in triggers {
            let job = ActionJob::new(&trigger.id, &event.id, trigger.priority, event.data.clone());
            if let Err(e) = self.queue.enqueue(&job).await {
                tracing::error!(
                    trigger_id = %trigger.id,
                    event_id = %event.id,
                    error = %e.safe_message(),
                    "failed to enqueue action-chain job"
                );
            }
        }

        Ok(())
    }

    /// Poller loop step (spec §4.D): claim a batch of `poll`-mode
    /// events, fan them out in-process, and resolve each by its
    /// handling outcome. Intended to be called on a timer by the
    /// binary's main loop.
    pub async fn poll_once(&self, batch: Option<i64>) -> Result<usize> {
        let events = self.store.claim_pending(batch).await?;
        let claimed = events.len();

        for event in events {
            self.registry.dispatch(&event).await;

            if let Err(e) = self.enqueue_matching_triggers(&event).await {
                self.store.fail_attempt(&event.id, &e.safe_message()).await?;
                continue;
            }

            self.store.complete(&event.id).await?;
        }

        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_channel_name() {
        assert_eq!(EVENTS_CHANNEL, "events");
    }
}
