//! Subscription validators

use super::trait_def::Validate;
use crate::core::webhooks::{EventType, WebhookConfig};
use url::Url;

/// Check that `url_str` is an absolute http(s) URL with a host
pub fn validate_webhook_url(url_str: &str, context: &str) -> Result<(), String> {
    let url =
        Url::parse(url_str).map_err(|e| format!("{} has invalid URL format: {}", context, e))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(format!(
                "{} must use http:// or https:// scheme, got: {}",
                context, scheme
            ));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(format!("{} URL has no host", context));
    }

    Ok(())
}

impl Validate for WebhookConfig {
    fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Webhook id cannot be empty".to_string());
        }

        let context = format!("Webhook '{}'", self.id);
        validate_webhook_url(&self.url, &context)?;

        if self.session_id.as_deref().is_some_and(str::is_empty) {
            return Err(format!("{} has an empty session id", context));
        }

        if self.events.is_empty() {
            return Err(format!("{} must subscribe to at least one event", context));
        }

        for event in &self.events {
            if !EventType::is_valid(event) {
                return Err(format!("{} subscribes to unknown event type: {}", context, event));
            }
        }

        Ok(())
    }
}
