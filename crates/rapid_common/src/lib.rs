// --- File: crates/rapid_common/src/lib.rs ---

// Declare modules within this crate
pub mod error; // Error handling
pub mod features; // Feature flag handling
pub mod logging; // Logging utilities
pub mod retry; // Bounded-retry helper shared by all crates
pub mod services; // Service abstractions for delivery channels

// Re-export error types and utilities for easier access
pub use error::{
    config_error, external_service_error, internal_error, not_found, unsupported,
    validation_error, Context, HttpStatusCode, RapidError,
};

// Re-export logging utilities for easier access
pub use logging::{init, init_with_level, log_error, log_result};

// Re-export the retry helper for easier access
pub use retry::{retry_with_policy, RetryAction, RetryPolicy};

// Re-export feature flag handling utilities for easier access
pub use features::{is_email_enabled, is_feature_enabled, is_push_enabled, is_sms_enabled};

// This crate provides common functionality that can be used across the application.
// It includes shared service traits, error handling, logging, and retry utilities.
