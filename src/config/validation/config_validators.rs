//! Core configuration validators
//!
//! Validation for the delivery pipeline tunables and the logging section.

use super::trait_def::Validate;
use crate::config::models::*;
use tracing::debug;

impl Validate for DeliveryConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating delivery configuration");

        if self.workers == 0 {
            return Err("Worker count must be greater than 0".to_string());
        }

        if self.workers > 1000 {
            return Err("Worker count seems too high (>1000)".to_string());
        }

        if self.queue_size == 0 {
            return Err("Queue size must be greater than 0".to_string());
        }

        if self.request_timeout_ms == 0 {
            return Err("Request timeout must be greater than 0".to_string());
        }

        if self.retry_delay_ms > self.max_retry_delay_ms {
            return Err(format!(
                "Retry delay ({}ms) cannot exceed max retry delay ({}ms)",
                self.retry_delay_ms, self.max_retry_delay_ms
            ));
        }

        if self.user_agent.trim().is_empty() {
            return Err("User agent cannot be empty".to_string());
        }

        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        if self.level.trim().is_empty() {
            return Err("Log level cannot be empty".to_string());
        }
        Ok(())
    }
}
