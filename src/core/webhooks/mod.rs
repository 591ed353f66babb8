//! Webhook dispatch and delivery
//!
//! Session events come in through [`WebhookManager::dispatch_event`], get
//! matched against subscriptions from a [`WebhookConfigStore`] and leave as
//! signed HTTP callbacks from a bounded worker pool.

mod delivery;
mod dispatcher;
pub mod events;
mod manager;
mod matcher;
mod store;
mod types;

pub use delivery::{
    EVENT_HEADER, EVENT_ID_HEADER, JobQueue, SIGNATURE_HEADER, WebhookDeliveryService,
};
pub use dispatcher::EventDispatcher;
pub use events::{ALL_EVENTS, EventType, ProviderEvent, RawEvent, TypedEvent};
pub use manager::{ManagerState, WebhookManager};
pub use matcher::match_subscriptions;
pub use store::{InMemoryConfigStore, WebhookConfigStore};
pub use types::{
    DeliveryJob, DeliveryOutcome, TestWebhookResult, WebhookConfig, WebhookEvent,
    WebhookPayload, WebhookStats,
};
