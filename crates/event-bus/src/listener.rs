//! Cross-process event listener (spec §4.D, §6)
//!
//! Subscribes to the Redis `events` pub/sub channel so that a bus
//! instance in one process receives events published by a bus in
//! another. Delivery here is fire-and-forget, matching Redis pub/sub
//! semantics: a subscriber that is down when a message is published
//! never sees it. The polling fallback is what guarantees eventual
//! delivery, not this listener.

use crate::bus::EVENTS_CHANNEL;
use crate::subscription::SubscriptionRegistry;
use futures_util::StreamExt;
use redis::Client;
use shared::models::Event;
use shared::{Error, Result};

pub struct EventListener {
    client: Client,
    registry: SubscriptionRegistry,
}

impl EventListener {
    pub fn new(client: Client, registry: SubscriptionRegistry) -> Self {
        Self { client, registry }
    }

    /// Connect and subscribe to the `events` channel, dispatching every
    /// message to the in-process registry. Runs until the connection is
    /// lost; callers should retry with backoff around this call.
    pub async fn start(&self) -> Result<()> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| Error::internal(format!("failed to open redis pubsub: {}", e)))?;

        pubsub
            .subscribe(EVENTS_CHANNEL)
            .await
            .map_err(|e| Error::internal(format!("failed to subscribe to '{}': {}", EVENTS_CHANNEL, e)))?;

        tracing::info!(channel = EVENTS_CHANNEL, "listening for cross-process events");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "dropped malformed pubsub payload");
                    continue;
                }
            };

            match serde_json::from_str::<Event>(&payload) {
                Ok(event) => self.registry.dispatch(&event).await,
                Err(e) => tracing::warn!(error = %e, "dropped undecodable event message"),
            }
        }

        Ok(())
    }
}
