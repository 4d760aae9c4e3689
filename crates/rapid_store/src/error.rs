//! Error types for the document store.

use thiserror::Error;

/// Errors that can occur during document store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error occurred due to missing or invalid configuration
    #[error("Store configuration error: {0}")]
    ConfigError(String),

    /// Error occurred while (de)serializing a document
    #[error("Document serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A document targeted by an update does not exist
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Error reported by the storage backend
    #[error("Store backend error: {0}")]
    BackendError(String),
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::BackendError(err.to_string())
    }
}

impl From<StoreError> for rapid_common::RapidError {
    fn from(err: StoreError) -> Self {
        rapid_common::RapidError::StoreError(err.to_string())
    }
}
