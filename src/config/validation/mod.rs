//! Configuration validation
//!
//! This module provides validation logic for all configuration structures.
//!
//! The validation is organized into several submodules:
//! - `trait_def`: Core Validate trait definition
//! - `config_validators`: Delivery and logging validators
//! - `webhook_validators`: Subscription validators
//! - `tests`: Test suite for all validators

mod config_validators;
mod trait_def;
mod webhook_validators;

pub use trait_def::Validate;
pub use webhook_validators::validate_webhook_url;
