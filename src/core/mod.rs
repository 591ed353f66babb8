//! Core functionality
//!
//! This module contains the event dispatch and webhook delivery pipeline.

pub mod webhooks;
