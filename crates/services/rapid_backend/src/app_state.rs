//! Application state assembly.
//!
//! The composition root: everything the notification core needs (store,
//! registry, history, presence, dispatcher, task notifier) is constructed
//! here, explicitly and in dependency order, and shared behind `Arc`s. No
//! component creates its own dependencies.

use std::sync::Arc;

use rapid_common::services::ChannelFactory;
use rapid_config::AppConfig;
use rapid_notify::handlers::NotifyState;
use rapid_notify::{
    MultiChannelDispatcher, NotificationHistory, PermissionOrchestrator, PresenceTracker,
    TaskEventNotifier, TokenRegistry,
};
use rapid_store::{build_store, DocumentStore, StoreError};

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub notify_state: Arc<NotifyState>,
}

impl AppState {
    /// Build the full application state from configuration.
    ///
    /// # Errors
    ///
    /// Fails only when the document store cannot be opened; delivery
    /// channels degrade to disabled instead of failing startup.
    pub async fn new(
        config: Arc<AppConfig>,
        channels: Arc<dyn ChannelFactory>,
    ) -> Result<Self, StoreError> {
        let store: Arc<dyn DocumentStore> = build_store(&config).await?;

        let registry = Arc::new(TokenRegistry::new(store.clone()));
        let history = Arc::new(NotificationHistory::new(store));
        let presence = Arc::new(PresenceTracker::new());
        let dispatcher = Arc::new(MultiChannelDispatcher::new(
            registry.clone(),
            history.clone(),
            presence.clone(),
            channels,
        ));
        let orchestrator = Arc::new(PermissionOrchestrator::new(registry.clone()));
        let task_notifier = Arc::new(TaskEventNotifier::new(dispatcher.clone(), orchestrator));

        let notify_state = Arc::new(NotifyState {
            registry,
            history,
            presence,
            dispatcher,
            task_notifier,
        });

        Ok(Self {
            config,
            notify_state,
        })
    }
}
