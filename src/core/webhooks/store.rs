//! Subscription store boundary
//!
//! Persistence of subscriptions lives outside this crate. The pipeline only
//! needs read access through [`WebhookConfigStore`].

use super::types::WebhookConfig;
use crate::utils::error::{Result, WebhookError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::info;

/// Read access to registered webhook subscriptions
#[async_trait]
pub trait WebhookConfigStore: Send + Sync {
    /// Subscriptions scoped to `session_id` plus every global one, in store order
    async fn get_by_session_and_global(&self, session_id: &str) -> Result<Vec<WebhookConfig>>;

    /// Look up a single subscription
    async fn get_by_id(&self, id: &str) -> Result<Option<WebhookConfig>>;
}

/// Process-local store keeping subscriptions in insertion order
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    configs: RwLock<Vec<WebhookConfig>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configs(configs: Vec<WebhookConfig>) -> Self {
        Self {
            configs: RwLock::new(configs),
        }
    }

    /// Insert a subscription, replacing one with the same id in place
    pub fn upsert(&self, mut config: WebhookConfig) -> Result<()> {
        if config.id.is_empty() {
            return Err(WebhookError::validation("Webhook id cannot be empty"));
        }

        let mut configs = self.configs.write();
        match configs.iter_mut().find(|c| c.id == config.id) {
            Some(existing) => {
                info!(webhook_id = %config.id, url = %config.url, "Updating webhook");
                config.created_at = existing.created_at;
                config.updated_at = Utc::now();
                *existing = config;
            }
            None => {
                info!(webhook_id = %config.id, url = %config.url, "Registering webhook");
                configs.push(config);
            }
        }
        Ok(())
    }

    /// Remove a subscription, returning it if it existed
    pub fn remove(&self, id: &str) -> Option<WebhookConfig> {
        let mut configs = self.configs.write();
        let index = configs.iter().position(|c| c.id == id)?;
        info!(webhook_id = %id, "Unregistering webhook");
        Some(configs.remove(index))
    }

    pub fn list(&self) -> Vec<WebhookConfig> {
        self.configs.read().clone()
    }

    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.read().is_empty()
    }
}

#[async_trait]
impl WebhookConfigStore for InMemoryConfigStore {
    async fn get_by_session_and_global(&self, session_id: &str) -> Result<Vec<WebhookConfig>> {
        Ok(self
            .configs
            .read()
            .iter()
            .filter(|c| c.session_id.as_deref().is_none_or(|s| s == session_id))
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<WebhookConfig>> {
        Ok(self.configs.read().iter().find(|c| c.id == id).cloned())
    }
}
