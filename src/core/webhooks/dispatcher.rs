//! Event dispatch
//!
//! Turns provider events into normalized webhook events and fans them out to
//! matching subscriptions as delivery jobs.

use super::delivery::JobQueue;
use super::events::{EventType, ProviderEvent};
use super::matcher::match_subscriptions;
use super::store::WebhookConfigStore;
use super::types::{DeliveryJob, WebhookEvent};
use crate::utils::error::Result;
use std::sync::Arc;
use tracing::{debug, error};

/// Resolves subscriptions for incoming events and submits delivery jobs
pub struct EventDispatcher {
    store: Arc<dyn WebhookConfigStore>,
    queue: Arc<dyn JobQueue>,
}

impl EventDispatcher {
    pub fn new(store: Arc<dyn WebhookConfigStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self { store, queue }
    }

    /// Dispatch one provider event for `session_id`
    ///
    /// Returns the number of delivery jobs accepted by the queue. Unsupported
    /// event types, store failures and unmatched events are not errors; only
    /// a payload that cannot be converted is.
    pub async fn dispatch_event(&self, raw: &dyn ProviderEvent, session_id: &str) -> Result<usize> {
        let tag = raw.event_type();
        let event_type = match tag.parse::<EventType>() {
            Ok(event_type) if !event_type.is_wildcard() => event_type,
            _ => {
                debug!(event_type = tag, session_id, "Ignoring unsupported event type");
                return Ok(0);
            }
        };

        let data = raw.to_payload()?;
        let event = Arc::new(WebhookEvent::new(session_id, event_type, data));

        let configs = match self.store.get_by_session_and_global(session_id).await {
            Ok(configs) => configs,
            Err(e) => {
                error!(
                    event_id = %event.id,
                    event_type = %event_type,
                    session_id,
                    error = %e,
                    "Failed to load webhook subscriptions"
                );
                return Ok(0);
            }
        };

        let matches = match_subscriptions(event_type.as_str(), session_id, &configs);
        if matches.is_empty() {
            debug!(
                event_id = %event.id,
                event_type = %event_type,
                session_id,
                "No webhook subscriptions match event"
            );
            return Ok(0);
        }

        let total = matches.len();
        let mut accepted = 0;
        for config in matches {
            if self.queue.enqueue(DeliveryJob::new(event.clone(), config)).await {
                accepted += 1;
            }
        }

        debug!(
            event_id = %event.id,
            event_type = %event_type,
            session_id,
            matched = total,
            accepted,
            "Queued webhook deliveries"
        );
        Ok(accepted)
    }
}
