//! Utility modules for the webhook pipeline
//!
//! ## Module Organization
//!
//! - **crypto**: HMAC signing and verification of webhook bodies
//! - **error**: Error type and result alias
//! - **logging**: Tracing subscriber setup

pub mod crypto;
pub mod error;
pub mod logging;

pub use crypto::{sign_payload, verify_payload_signature};
pub use error::{Result, WebhookError};
pub use logging::init_logging;
