//! Configuration management for the webhook pipeline
//!
//! This module handles loading, validation, and management of delivery,
//! logging and subscription configuration.

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::core::webhooks::WebhookConfig;
use crate::utils::error::{Result, WebhookError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Delivery queue, worker pool and retry policy
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Statically registered subscriptions
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

impl Config {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path).await?;

        let config = Self::from_yaml(&content)?;

        debug!(webhooks = config.webhooks.len(), "Configuration loaded successfully");
        Ok(config)
    }

    /// Parse and validate configuration from a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Build configuration from defaults overridden by `lookup`
    ///
    /// `lookup` resolves a variable name to its value; unset and blank
    /// variables keep the default.
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        let delivery = &mut config.delivery;
        if let Some(v) = var("WEBHOOK_WORKERS") {
            delivery.workers = parse_var("WEBHOOK_WORKERS", &v)?;
        }
        if let Some(v) = var("WEBHOOK_QUEUE_SIZE") {
            delivery.queue_size = parse_var("WEBHOOK_QUEUE_SIZE", &v)?;
        }
        if let Some(v) = var("WEBHOOK_MAX_RETRIES") {
            delivery.max_retries = parse_var("WEBHOOK_MAX_RETRIES", &v)?;
        }
        if let Some(v) = var("WEBHOOK_RETRY_DELAY_MS") {
            delivery.retry_delay_ms = parse_var("WEBHOOK_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = var("WEBHOOK_MAX_RETRY_DELAY_MS") {
            delivery.max_retry_delay_ms = parse_var("WEBHOOK_MAX_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = var("WEBHOOK_BACKOFF") {
            delivery.backoff = parse_var("WEBHOOK_BACKOFF", &v)?;
        }
        if let Some(v) = var("WEBHOOK_REQUEST_TIMEOUT_MS") {
            delivery.request_timeout_ms = parse_var("WEBHOOK_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("WEBHOOK_ENQUEUE_TIMEOUT_MS") {
            delivery.enqueue_timeout_ms = parse_var("WEBHOOK_ENQUEUE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("WEBHOOK_SHUTDOWN_TIMEOUT_MS") {
            delivery.shutdown_timeout_ms = parse_var("WEBHOOK_SHUTDOWN_TIMEOUT_MS", &v)?;
        }

        if let Some(v) = var("WEBHOOK_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = var("WEBHOOK_LOG_FORMAT") {
            config.logging.format = parse_var("WEBHOOK_LOG_FORMAT", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Get delivery configuration
    pub fn delivery(&self) -> &DeliveryConfig {
        &self.delivery
    }

    /// Get logging configuration
    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    /// Get statically registered subscriptions
    pub fn webhooks(&self) -> &[WebhookConfig] {
        &self.webhooks
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");

        self.delivery
            .validate()
            .map_err(|e| WebhookError::Config(format!("Delivery config error: {}", e)))?;

        self.logging
            .validate()
            .map_err(|e| WebhookError::Config(format!("Logging config error: {}", e)))?;

        let mut ids = HashSet::new();
        for webhook in &self.webhooks {
            webhook
                .validate()
                .map_err(|e| WebhookError::Config(format!("Webhook config error: {}", e)))?;
            if !ids.insert(webhook.id.as_str()) {
                return Err(WebhookError::Config(format!(
                    "Duplicate webhook id: {}",
                    webhook.id
                )));
            }
        }

        debug!("Configuration validation completed");
        Ok(())
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| WebhookError::Config(format!("Invalid value for {}: {}", key, e)))
}
