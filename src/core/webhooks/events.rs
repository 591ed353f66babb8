//! Event type registry and provider event boundary
//!
//! The registry is a closed enum: a tag that does not parse into an
//! [`EventType`] is unsupported and dropped by the dispatcher.

use crate::utils::error::{Result, WebhookError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Wildcard subscription entry matching every event type
pub const ALL_EVENTS: &str = "All";

/// Session event types that can be delivered to webhooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    // Connection and session lifecycle
    Connected,
    Disconnected,
    ConnectFailure,
    LoggedOut,
    StreamError,
    StreamReplaced,
    TemporaryBan,
    ClientOutdated,
    KeepAliveTimeout,
    KeepAliveRestored,

    // Pairing
    PairSuccess,
    PairError,
    #[serde(rename = "QR")]
    Qr,
    #[serde(rename = "QRScannedWithoutMultidevice")]
    QrScannedWithoutMultidevice,

    // Messages
    Message,
    UndecryptableMessage,
    Receipt,
    MediaRetry,
    HistorySync,
    AppStateSyncComplete,
    PushNameSetting,

    // Groups and contacts
    GroupInfo,
    JoinedGroup,
    Picture,
    Blocklist,
    Contact,
    PushName,
    BusinessName,
    IdentityChange,

    // Presence
    Presence,
    ChatPresence,

    // Calls
    CallOffer,
    CallAccept,
    CallTerminate,

    // Newsletters
    NewsletterJoin,
    NewsletterLeave,

    /// Subscription wildcard
    All,
}

impl EventType {
    /// Every registered type, wildcard included
    pub const VARIANTS: &'static [EventType] = &[
        EventType::Connected,
        EventType::Disconnected,
        EventType::ConnectFailure,
        EventType::LoggedOut,
        EventType::StreamError,
        EventType::StreamReplaced,
        EventType::TemporaryBan,
        EventType::ClientOutdated,
        EventType::KeepAliveTimeout,
        EventType::KeepAliveRestored,
        EventType::PairSuccess,
        EventType::PairError,
        EventType::Qr,
        EventType::QrScannedWithoutMultidevice,
        EventType::Message,
        EventType::UndecryptableMessage,
        EventType::Receipt,
        EventType::MediaRetry,
        EventType::HistorySync,
        EventType::AppStateSyncComplete,
        EventType::PushNameSetting,
        EventType::GroupInfo,
        EventType::JoinedGroup,
        EventType::Picture,
        EventType::Blocklist,
        EventType::Contact,
        EventType::PushName,
        EventType::BusinessName,
        EventType::IdentityChange,
        EventType::Presence,
        EventType::ChatPresence,
        EventType::CallOffer,
        EventType::CallAccept,
        EventType::CallTerminate,
        EventType::NewsletterJoin,
        EventType::NewsletterLeave,
        EventType::All,
    ];

    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Connected => "Connected",
            EventType::Disconnected => "Disconnected",
            EventType::ConnectFailure => "ConnectFailure",
            EventType::LoggedOut => "LoggedOut",
            EventType::StreamError => "StreamError",
            EventType::StreamReplaced => "StreamReplaced",
            EventType::TemporaryBan => "TemporaryBan",
            EventType::ClientOutdated => "ClientOutdated",
            EventType::KeepAliveTimeout => "KeepAliveTimeout",
            EventType::KeepAliveRestored => "KeepAliveRestored",
            EventType::PairSuccess => "PairSuccess",
            EventType::PairError => "PairError",
            EventType::Qr => "QR",
            EventType::QrScannedWithoutMultidevice => "QRScannedWithoutMultidevice",
            EventType::Message => "Message",
            EventType::UndecryptableMessage => "UndecryptableMessage",
            EventType::Receipt => "Receipt",
            EventType::MediaRetry => "MediaRetry",
            EventType::HistorySync => "HistorySync",
            EventType::AppStateSyncComplete => "AppStateSyncComplete",
            EventType::PushNameSetting => "PushNameSetting",
            EventType::GroupInfo => "GroupInfo",
            EventType::JoinedGroup => "JoinedGroup",
            EventType::Picture => "Picture",
            EventType::Blocklist => "Blocklist",
            EventType::Contact => "Contact",
            EventType::PushName => "PushName",
            EventType::BusinessName => "BusinessName",
            EventType::IdentityChange => "IdentityChange",
            EventType::Presence => "Presence",
            EventType::ChatPresence => "ChatPresence",
            EventType::CallOffer => "CallOffer",
            EventType::CallAccept => "CallAccept",
            EventType::CallTerminate => "CallTerminate",
            EventType::NewsletterJoin => "NewsletterJoin",
            EventType::NewsletterLeave => "NewsletterLeave",
            EventType::All => ALL_EVENTS,
        }
    }

    /// Whether `name` is a registered event type (the wildcard counts)
    pub fn is_valid(name: &str) -> bool {
        name.parse::<EventType>().is_ok()
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, EventType::All)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self> {
        EventType::VARIANTS
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| WebhookError::validation(format!("Unsupported event type: {}", s)))
    }
}

/// An event handed over by the messaging session
///
/// Producers tag events explicitly; the dispatcher never inspects runtime
/// types to work out what an event is.
pub trait ProviderEvent: Send + Sync {
    /// Type tag as produced upstream; may be outside the registry
    fn event_type(&self) -> &str;

    /// Convert the event into a generic JSON object
    fn to_payload(&self) -> Result<Map<String, Value>>;
}

/// A tagged event whose payload is already a JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl RawEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

impl ProviderEvent for RawEvent {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn to_payload(&self) -> Result<Map<String, Value>> {
        into_object(self.payload.clone())
    }
}

/// A tagged event carrying any serializable payload
#[derive(Debug, Clone)]
pub struct TypedEvent<T> {
    pub event_type: EventType,
    pub inner: T,
}

impl<T> TypedEvent<T> {
    pub fn new(event_type: EventType, inner: T) -> Self {
        Self { event_type, inner }
    }
}

impl<T: Serialize + Send + Sync> ProviderEvent for TypedEvent<T> {
    fn event_type(&self) -> &str {
        self.event_type.as_str()
    }

    fn to_payload(&self) -> Result<Map<String, Value>> {
        let value = serde_json::to_value(&self.inner)
            .map_err(|e| WebhookError::PayloadConversion(e.to_string()))?;
        into_object(value)
    }
}

/// Payloads must be JSON objects; `null` becomes an empty object
fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(WebhookError::PayloadConversion(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
