//! # session-webhooks
//!
//! Event dispatch and webhook delivery for messaging sessions.
//!
//! Events produced by a session are matched against registered
//! subscriptions and POSTed to their URLs as signed JSON from a bounded
//! worker pool, with retries and backoff for transient failures.
//!
//! ## Features
//!
//! - **Closed event registry**: unknown event tags are dropped, never delivered
//! - **Session scoping**: subscriptions are global or bound to one session
//! - **Bounded queue**: dispatch never blocks on slow endpoints
//! - **Retries with backoff**: linear by default, fixed or exponential on request
//! - **HMAC signatures**: `X-Webhook-Signature: sha256=<hex>` when a secret is set
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use session_webhooks::{
//!     DeliveryConfig, InMemoryConfigStore, RawEvent, WebhookConfig, WebhookManager,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryConfigStore::new());
//!     store.upsert(
//!         WebhookConfig::new("crm", "https://crm.example.com/hooks")
//!             .with_secret("s3cr3t")
//!             .with_events(["Message"]),
//!     )?;
//!
//!     let manager = WebhookManager::new(DeliveryConfig::default(), store)?;
//!     manager.start().await?;
//!
//!     let event = RawEvent::new("Message", serde_json::json!({"text": "hi"}));
//!     manager.dispatch_event(&event, "session-1").await?;
//!
//!     manager.stop().await?;
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod utils;

// Re-export main types
pub use config::{BackoffStrategy, Config, DeliveryConfig, LogFormat, LoggingConfig};
pub use utils::error::{Result, WebhookError};

pub use core::webhooks::{
    DeliveryOutcome, EventType, InMemoryConfigStore, ManagerState, ProviderEvent, RawEvent,
    TestWebhookResult, TypedEvent, WebhookConfig, WebhookConfigStore, WebhookEvent,
    WebhookManager, WebhookStats,
};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Description of the crate
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
