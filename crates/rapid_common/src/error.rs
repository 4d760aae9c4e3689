// --- File: crates/rapid_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type for all RapidNotify errors.
///
/// This enum provides a common set of error variants that can be used across all crates.
/// Each crate can extend this by implementing From<SpecificError> for RapidError.
#[derive(Error, Debug)]
pub enum RapidError {
    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during authentication or authorization
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during a document store operation
    #[error("Store error: {0}")]
    StoreError(String),

    /// The runtime environment cannot support the requested operation
    #[error("Unsupported environment: {0}")]
    UnsupportedError(String),

    /// Error occurred during external service call
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    /// Error occurred due to a resource not being found
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Error occurred due to a timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A trait for converting errors to HTTP status codes.
///
/// This trait can be implemented by error types to provide a consistent way
/// to convert errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for RapidError {
    fn status_code(&self) -> u16 {
        match self {
            RapidError::HttpError(_) => 500,
            RapidError::ParseError(_) => 400,
            RapidError::ConfigError(_) => 500,
            RapidError::AuthError(_) => 401,
            RapidError::ValidationError(_) => 400,
            RapidError::StoreError(_) => 500,
            RapidError::UnsupportedError(_) => 422,
            RapidError::ExternalServiceError { .. } => 502,
            RapidError::NotFoundError(_) => 404,
            RapidError::TimeoutError(_) => 504,
            RapidError::InternalError(_) => 500,
        }
    }
}

/// A trait for adding context to errors.
///
/// This trait can be implemented by error types to provide a consistent way
/// to add context to errors.
pub trait Context<T, E> {
    /// Adds context to an error.
    fn context<C>(self, context: C) -> Result<T, RapidError>
    where
        C: fmt::Display + Send + Sync + 'static;

    /// Adds context to an error with a lazy context provider.
    fn with_context<C, F>(self, f: F) -> Result<T, RapidError>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E: std::error::Error + Send + Sync + 'static> Context<T, E> for Result<T, E> {
    fn context<C>(self, context: C) -> Result<T, RapidError>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|error| RapidError::InternalError(format!("{}: {}", context, error)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, RapidError>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|error| RapidError::InternalError(format!("{}: {}", f(), error)))
    }
}

// Common error conversions
impl From<reqwest::Error> for RapidError {
    fn from(err: reqwest::Error) -> Self {
        RapidError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for RapidError {
    fn from(err: serde_json::Error) -> Self {
        RapidError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for RapidError {
    fn from(err: std::io::Error) -> Self {
        RapidError::InternalError(err.to_string())
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> RapidError {
    RapidError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> RapidError {
    RapidError::ValidationError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> RapidError {
    RapidError::NotFoundError(message.to_string())
}

pub fn unsupported<T: fmt::Display>(message: T) -> RapidError {
    RapidError::UnsupportedError(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> RapidError {
    RapidError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}

pub fn internal_error<T: fmt::Display>(message: T) -> RapidError {
    RapidError::InternalError(message.to_string())
}
