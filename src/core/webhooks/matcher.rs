//! Subscription matching
//!
//! Pure filtering over a snapshot of subscriptions; no locking, no I/O.

use super::events::ALL_EVENTS;
use super::types::WebhookConfig;

impl WebhookConfig {
    /// Whether this subscription should receive `event_type` from `session_id`
    pub fn matches(&self, event_type: &str, session_id: &str) -> bool {
        self.enabled
            && self
                .session_id
                .as_deref()
                .is_none_or(|scope| scope == session_id)
            && self
                .events
                .iter()
                .any(|e| e == ALL_EVENTS || e == event_type)
    }
}

/// Subscriptions that should receive the event, in store order
pub fn match_subscriptions<'a, I>(event_type: &str, session_id: &str, configs: I) -> Vec<WebhookConfig>
where
    I: IntoIterator<Item = &'a WebhookConfig>,
{
    configs
        .into_iter()
        .filter(|config| config.matches(event_type, session_id))
        .cloned()
        .collect()
}
