//! Logging utilities for the RapidNotify application.
//!
//! This module provides a standardized approach to logging across all crates
//! in the application. It configures the tracing subscriber once, at the
//! composition root, so individual crates only depend on the `tracing` macros.

use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber with the default log level (INFO).
///
/// This function should be called at the start of the application to set up
/// logging. The `RUST_LOG` environment variable still takes precedence over
/// the default directive.
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize the tracing subscriber with a specific log level.
///
/// # Arguments
///
/// * `level` - The minimum log level to display for this workspace's crates.
pub fn init_with_level(level: Level) {
    // Filter directives match on the crate root of the event target, so
    // each workspace crate needs its own directive.
    let crates = [
        "rapid_common",
        "rapid_config",
        "rapid_store",
        "rapid_push",
        "rapid_email",
        "rapid_twilio",
        "rapid_notify",
        "rapid_backend",
    ];
    let mut filter = EnvFilter::from_default_env();
    for name in crates {
        filter = filter.add_directive(format!("{name}={level}").parse().unwrap());
    }

    // Use try_init to handle the case where a global default subscriber has
    // already been set (tests initialize logging more than once).
    let result = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}

/// Log an error with context at the ERROR level.
///
/// # Arguments
///
/// * `error` - The error to log.
/// * `context` - Additional context information about the error.
pub fn log_error<E: std::fmt::Display>(error: E, context: &str) {
    error!("{}: {}", context, error);
}

/// Log a result, with different messages for success and error cases.
///
/// Logs a success message at the INFO level if the result is Ok, or an error
/// message at the ERROR level if the result is Err, and hands the original
/// result back so this can be used in a chain.
pub fn log_result<T, E: std::fmt::Display>(
    result: Result<T, E>,
    success_message: &str,
    error_context: &str,
) -> Result<T, E> {
    match &result {
        Ok(_) => info!("{}", success_message),
        Err(e) => error!("{}: {}", error_context, e),
    }
    result
}
