//! Store backend selection.
//!
//! The backend is chosen from configuration at the composition root; the
//! rest of the application only ever sees `Arc<dyn DocumentStore>`.

use crate::error::StoreError;
use crate::memory::MemoryStore;
use crate::store::DocumentStore;
use rapid_config::AppConfig;
use std::sync::Arc;
use tracing::info;

/// Build the configured document store backend.
///
/// Falls back to the in-memory store when no store section is configured,
/// which keeps local development working without a database.
///
/// # Errors
///
/// Returns an error for an unknown backend name or a failed connection.
pub async fn build_store(config: &Arc<AppConfig>) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let store_config = match config.store.as_ref() {
        Some(store_config) => store_config,
        None => {
            info!("No store configured, using in-memory document store");
            return Ok(Arc::new(MemoryStore::new()));
        }
    };

    match store_config.backend.as_str() {
        "memory" => {
            info!("Using in-memory document store");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let url = store_config
                .url
                .as_deref()
                .ok_or_else(|| StoreError::ConfigError("Store URL is missing".to_string()))?;
            let store = crate::sql::SqliteStore::connect(url).await?;
            store.init_schema().await?;
            info!("Using SQLite document store");
            Ok(Arc::new(store))
        }
        other => Err(StoreError::ConfigError(format!(
            "Unknown store backend: {other}"
        ))),
    }
}
