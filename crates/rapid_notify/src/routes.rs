// --- File: crates/rapid_notify/src/routes.rs ---
//! Route table for the notification API.

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers::{
    handle_classify, handle_delete_entry, handle_get_preferences, handle_health,
    handle_history_list, handle_mark_all_read, handle_mark_all_unread, handle_mark_read,
    handle_mark_unread, handle_presence, handle_register_token, handle_send, handle_task_event,
    handle_update_preferences, NotifyState,
};

/// Creates a router containing all notification routes.
pub fn routes(state: Arc<NotifyState>) -> Router {
    Router::new()
        .route("/notify/classify", post(handle_classify))
        .route("/notify/register-token", post(handle_register_token))
        .route("/notify/send", post(handle_send))
        .route("/notify/task-event", post(handle_task_event))
        .route("/notify/presence", post(handle_presence))
        .route("/notify/history/{user_id}", get(handle_history_list))
        .route(
            "/notify/history/{user_id}/read-all",
            post(handle_mark_all_read),
        )
        .route(
            "/notify/history/{user_id}/unread-all",
            post(handle_mark_all_unread),
        )
        .route(
            "/notify/history/entry/{entry_id}/read",
            post(handle_mark_read),
        )
        .route(
            "/notify/history/entry/{entry_id}/unread",
            post(handle_mark_unread),
        )
        .route(
            "/notify/history/entry/{entry_id}",
            delete(handle_delete_entry),
        )
        .route(
            "/notify/preferences/{user_id}",
            get(handle_get_preferences).patch(handle_update_preferences),
        )
        .route("/notify/health", get(handle_health))
        .with_state(state)
}
