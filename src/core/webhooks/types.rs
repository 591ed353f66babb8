//! Webhook type definitions
//!
//! This module contains all webhook-related types, enums, and data structures.

use super::events::EventType;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Webhook subscription
///
/// Owned by the external config store; this crate only reads snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Subscription ID
    pub id: String,
    /// Session scope; `None` receives events from every session
    #[serde(default)]
    pub session_id: Option<String>,
    /// Target URL
    pub url: String,
    /// Shared secret used to sign request bodies
    #[serde(default)]
    pub secret: Option<String>,
    /// Subscribed event type names, may contain `All`
    #[serde(default)]
    pub events: Vec<String>,
    /// Whether the subscription is enabled
    #[serde(default = "crate::config::default_true")]
    pub enabled: bool,
    /// Extra HTTP headers sent with every delivery
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl WebhookConfig {
    /// Create an enabled, global subscription
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            session_id: None,
            url: url.into(),
            secret: None,
            events: Vec::new(),
            enabled: true,
            headers: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events = events.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_global(&self) -> bool {
        self.session_id.is_none()
    }

    /// Secret to sign with, ignoring blank values
    pub fn signing_secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }
}

/// Normalized event delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID, generated at dispatch time
    pub id: Uuid,
    pub session_id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// Opaque payload, forwarded untouched
    pub data: Map<String, Value>,
}

impl WebhookEvent {
    pub fn new(session_id: impl Into<String>, event_type: EventType, data: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            event_type,
            timestamp: Utc::now(),
            data,
        }
    }

    /// Wire representation of this event
    pub fn payload(&self) -> WebhookPayload<'_> {
        WebhookPayload {
            event: self.event_type.as_str(),
            session_id: &self.session_id,
            timestamp: self.timestamp.timestamp(),
            data: &self.data,
        }
    }

    /// Serialized request body
    pub fn to_body(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.payload())?)
    }
}

/// JSON body POSTed to subscribers
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub event: &'a str,
    #[serde(rename = "sessionID")]
    pub session_id: &'a str,
    /// Unix seconds
    pub timestamp: i64,
    pub data: &'a Map<String, Value>,
}

/// One (event, subscription) pair moving through the delivery queue
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub event: Arc<WebhookEvent>,
    pub config: WebhookConfig,
    /// Attempts made so far
    pub attempts: u32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl DeliveryJob {
    pub fn new(event: Arc<WebhookEvent>, config: WebhookConfig) -> Self {
        Self {
            event,
            config,
            attempts: 0,
            next_attempt_at: None,
            last_error: None,
        }
    }
}

/// Result of a single delivery attempt
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// Endpoint answered 2xx
    Delivered { status_code: u16, latency: Duration },
    /// Transient failure, worth retrying
    RetryableFailure {
        reason: String,
        status_code: Option<u16>,
    },
    /// Failure that will not go away on retry
    PermanentFailure {
        reason: String,
        status_code: Option<u16>,
    },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryOutcome::RetryableFailure { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            DeliveryOutcome::Delivered { status_code, .. } => Some(*status_code),
            DeliveryOutcome::RetryableFailure { status_code, .. }
            | DeliveryOutcome::PermanentFailure { status_code, .. } => *status_code,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DeliveryOutcome::Delivered { .. } => None,
            DeliveryOutcome::RetryableFailure { reason, .. }
            | DeliveryOutcome::PermanentFailure { reason, .. } => Some(reason),
        }
    }
}

/// Point-in-time view of the delivery subsystem
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookStats {
    pub running: bool,
    pub workers: usize,
    /// Jobs currently waiting in the queue
    pub queue_size: usize,
    pub queue_capacity: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Jobs delivered since process start
    pub delivered: u64,
    /// Retries scheduled since process start
    pub retried: u64,
    /// Jobs that ended in a permanent failure
    pub failed: u64,
    /// Jobs dropped because the queue was full or closed
    pub dropped: u64,
}

/// Answer to an operator-initiated test delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestWebhookResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<String>,
}

impl TestWebhookResult {
    pub fn from_outcome(outcome: &DeliveryOutcome, latency: Duration) -> Self {
        Self {
            success: outcome.is_delivered(),
            status_code: outcome.status_code(),
            latency_ms: latency.as_millis() as u64,
            error: outcome.error().map(str::to_string),
        }
    }
}
