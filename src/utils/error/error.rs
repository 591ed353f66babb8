//! Error handling for the webhook pipeline
//!
//! This module defines all error types used throughout the crate.

#![allow(missing_docs)]

use thiserror::Error;

/// Result type alias for the webhook pipeline
pub type Result<T> = std::result::Result<T, WebhookError>;

/// Main error type for the webhook pipeline
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation requires a running manager
    #[error("Webhook manager is not started")]
    NotStarted,

    /// Raw event could not be turned into a generic payload
    #[error("Payload conversion error: {0}")]
    PayloadConversion(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Network errors
    #[error("Network error: {0}")]
    Network(String),

    /// Crypto errors
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Subscription store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Helper functions for creating specific errors
impl WebhookError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the caller could reasonably succeed by trying again later
    pub fn is_retryable(&self) -> bool {
        match self {
            WebhookError::Network(_) | WebhookError::Store(_) => true,
            WebhookError::HttpClient(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}
