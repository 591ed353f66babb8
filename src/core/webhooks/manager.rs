//! Webhook manager implementation
//!
//! This module contains the WebhookManager, the only entry point the rest of
//! the application talks to. It owns the delivery service and dispatcher and
//! gates every operation on its lifecycle state.

use super::delivery::WebhookDeliveryService;
use super::dispatcher::EventDispatcher;
use super::events::{EventType, ProviderEvent};
use super::store::WebhookConfigStore;
use super::types::{TestWebhookResult, WebhookEvent, WebhookStats};
use crate::config::DeliveryConfig;
use crate::utils::error::{Result, WebhookError};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Lifecycle of the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ManagerState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl ManagerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ManagerState::Starting,
            2 => ManagerState::Running,
            3 => ManagerState::Stopping,
            _ => ManagerState::Stopped,
        }
    }
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManagerState::Stopped => "stopped",
            ManagerState::Starting => "starting",
            ManagerState::Running => "running",
            ManagerState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Webhook manager
pub struct WebhookManager {
    store: Arc<dyn WebhookConfigStore>,
    delivery: Arc<WebhookDeliveryService>,
    dispatcher: EventDispatcher,
    /// Current [`ManagerState`], lock-free
    state: AtomicU8,
}

impl WebhookManager {
    /// Create a stopped manager
    pub fn new(config: DeliveryConfig, store: Arc<dyn WebhookConfigStore>) -> Result<Self> {
        let delivery = Arc::new(WebhookDeliveryService::new(config)?);
        let dispatcher = EventDispatcher::new(store.clone(), delivery.clone());

        Ok(Self {
            store,
            delivery,
            dispatcher,
            state: AtomicU8::new(ManagerState::Stopped as u8),
        })
    }

    pub fn state(&self) -> ManagerState {
        ManagerState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.state() == ManagerState::Running
    }

    fn transition(&self, from: ManagerState, to: ManagerState) -> std::result::Result<(), ManagerState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ManagerState::from_u8)
    }

    /// Start delivery workers
    ///
    /// Only a stopped manager starts. Any other state, including a stop in
    /// progress, makes this a logged no-op; the state is left as it is.
    pub async fn start(&self) -> Result<()> {
        if let Err(current) = self.transition(ManagerState::Stopped, ManagerState::Starting) {
            warn!(state = %current, "Webhook manager is {}, ignoring start", current);
            return Ok(());
        }

        info!("Starting webhook manager");
        if let Err(e) = self.delivery.start().await {
            self.state.store(ManagerState::Stopped as u8, Ordering::Release);
            return Err(e);
        }

        self.state.store(ManagerState::Running as u8, Ordering::Release);
        info!("Webhook manager started");
        Ok(())
    }

    /// Stop accepting events and drain workers; idempotent
    pub async fn stop(&self) -> Result<()> {
        if let Err(current) = self.transition(ManagerState::Running, ManagerState::Stopping) {
            warn!(state = %current, "Webhook manager is {}, ignoring stop", current);
            return Ok(());
        }

        info!("Stopping webhook manager");
        let result = self.delivery.stop().await;
        self.state.store(ManagerState::Stopped as u8, Ordering::Release);
        info!("Webhook manager stopped");
        result
    }

    /// Wait until workers have taken every queued job or `limit` passes
    ///
    /// Returns whether the queue emptied. Jobs in flight and pending retries
    /// are not waited for.
    pub async fn drain(&self, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            if self.delivery.queue_size() == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    /// Fan an event out to matching subscriptions
    ///
    /// Silently does nothing unless the manager is running. Returns the
    /// number of delivery jobs queued.
    pub async fn dispatch_event(&self, event: &dyn ProviderEvent, session_id: &str) -> Result<usize> {
        if !self.is_started() {
            return Ok(0);
        }
        self.dispatcher.dispatch_event(event, session_id).await
    }

    /// Synchronously deliver a synthetic event to one subscription
    ///
    /// Skips the queue and the matcher, makes a single attempt and reports
    /// the outcome. Endpoint failures are reported in the result, not as
    /// errors.
    pub async fn test_webhook(
        &self,
        config_id: &str,
        event_type: &str,
        test_data: Map<String, Value>,
    ) -> Result<TestWebhookResult> {
        if !self.is_started() {
            return Err(WebhookError::NotStarted);
        }

        let event_type: EventType = event_type.parse()?;
        if event_type.is_wildcard() {
            return Err(WebhookError::validation(
                "Test events need a concrete event type",
            ));
        }
        let config = self
            .store
            .get_by_id(config_id)
            .await?
            .ok_or_else(|| WebhookError::not_found(format!("Webhook not found: {}", config_id)))?;

        let event = WebhookEvent::new(
            config.session_id.clone().unwrap_or_default(),
            event_type,
            test_data,
        );

        info!(
            webhook_id = %config.id,
            event_id = %event.id,
            event_type = %event_type,
            "Sending test webhook"
        );

        let start_time = Instant::now();
        let result = match self.delivery.deliver_event(&event, &config).await {
            Ok(outcome) => TestWebhookResult::from_outcome(&outcome, start_time.elapsed()),
            Err(e) => TestWebhookResult {
                success: false,
                status_code: None,
                latency_ms: start_time.elapsed().as_millis() as u64,
                error: Some(e.to_string()),
            },
        };

        if !result.success {
            warn!(
                webhook_id = %config.id,
                status = ?result.status_code,
                error = result.error.as_deref().unwrap_or_default(),
                "Test webhook failed"
            );
        }
        Ok(result)
    }

    /// Get webhook statistics
    pub fn get_stats(&self) -> WebhookStats {
        WebhookStats {
            running: self.is_started(),
            ..self.delivery.stats()
        }
    }
}

impl fmt::Debug for WebhookManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookManager")
            .field("state", &self.state())
            .field("stats", &self.get_stats())
            .finish()
    }
}
