//! Configuration data models
//!
//! This module defines all configuration structures used by the pipeline.

#![allow(missing_docs)]

pub mod delivery;
pub mod logging;

// Re-export all configuration types
pub use delivery::*;
pub use logging::*;

/// Default number of delivery workers
pub fn default_workers() -> usize {
    10
}

/// Default delivery queue capacity
pub fn default_queue_size() -> usize {
    1000
}

/// Default maximum retry attempts
pub fn default_max_retries() -> u32 {
    3
}

/// Default base retry delay in milliseconds
pub fn default_retry_delay_ms() -> u64 {
    5000
}

/// Default retry delay ceiling in milliseconds
pub fn default_max_retry_delay_ms() -> u64 {
    300_000 // 5 minutes
}

/// Default per-request timeout in milliseconds
pub fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Default bounded wait when the queue is full, in milliseconds
pub fn default_enqueue_timeout_ms() -> u64 {
    100
}

/// Default graceful drain window on shutdown, in milliseconds
pub fn default_shutdown_timeout_ms() -> u64 {
    30_000
}

pub fn default_user_agent() -> String {
    format!("{}/{}", crate::NAME, crate::VERSION)
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}
