//! Error taxonomy for the notification core.
//!
//! Kept deliberately small: permission and capability failures are not
//! errors here, they resolve to disabled `EnableOutcome`s so a session can
//! render the reason. What remains is caller identity and storage, where
//! store failures either degrade (history reads) or propagate (token
//! upserts) depending on the call site.

use rapid_common::HttpStatusCode;
use rapid_store::StoreError;
use thiserror::Error;

/// Errors produced by the notification core.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The caller is not authenticated. The only error `send` raises.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// A document-store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl HttpStatusCode for NotifyError {
    fn status_code(&self) -> u16 {
        match self {
            NotifyError::Unauthenticated(_) => 401,
            NotifyError::Store(_) => 500,
        }
    }
}
