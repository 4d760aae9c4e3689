// --- File: crates/rapid_notify/src/handlers.rs ---
//! Axum handlers for the notification API.
//!
//! Thin HTTP adapters over the core: each handler parses a payload, calls
//! one core operation, and maps its error to a status code through
//! [`HttpStatusCode`]. No notification policy lives in this module.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use rapid_common::HttpStatusCode;

use crate::capability::{classify_environment, Capability, ClientRuntime};
use crate::dispatch::MultiChannelDispatcher;
use crate::error::NotifyError;
use crate::history::NotificationHistory;
use crate::models::{
    ChannelToggles, DeviceMetadata, DispatchReport, NotificationEnvelope, NotificationPreferences,
    Recipient,
};
use crate::presence::PresenceTracker;
use crate::registry::TokenRegistry;
use crate::tasks::{TaskEvent, TaskEventNotifier, TaskNotificationOutcome};

/// Shared state threaded through every notification route.
#[derive(Clone)]
pub struct NotifyState {
    pub registry: Arc<TokenRegistry>,
    pub history: Arc<NotificationHistory>,
    pub presence: Arc<PresenceTracker>,
    pub dispatcher: Arc<MultiChannelDispatcher>,
    pub task_notifier: Arc<TaskEventNotifier>,
}

fn error_response(err: NotifyError) -> (StatusCode, String) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, err.to_string())
}

// --- Capability classification ---

/// Classify the calling session's runtime.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/notify/classify",
    request_body = ClientRuntime,
    responses(
        (status = 200, description = "Runtime classified", body = Capability)
    ),
    tag = "Notifications"
))]
pub async fn handle_classify(Json(runtime): Json<ClientRuntime>) -> Json<Capability> {
    Json(classify_environment(&runtime))
}

// --- Token registration ---

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTokenRequest {
    pub token: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub metadata: DeviceMetadata,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTokenResponse {
    pub doc_id: String,
}

/// Register or refresh a push token.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/notify/register-token",
    request_body = RegisterTokenRequest,
    responses(
        (status = 200, description = "Token registered", body = RegisterTokenResponse),
        (status = 500, description = "Store failure")
    ),
    tag = "Notifications"
))]
pub async fn handle_register_token(
    State(state): State<Arc<NotifyState>>,
    Json(payload): Json<RegisterTokenRequest>,
) -> Result<Json<RegisterTokenResponse>, (StatusCode, String)> {
    let doc_id = state
        .registry
        .upsert_token(&payload.token, payload.email.as_deref(), &payload.metadata)
        .await
        .map_err(error_response)?;
    Ok(Json(RegisterTokenResponse { doc_id }))
}

// --- Dispatch ---

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub recipient: Recipient,
    pub notification: NotificationEnvelope,
}

/// Dispatch a notification across all applicable channels.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/notify/send",
    request_body = SendRequest,
    responses(
        (status = 200, description = "Dispatch attempted, see per-channel results", body = DispatchReport),
        (status = 401, description = "Recipient has no identity")
    ),
    tag = "Notifications"
))]
pub async fn handle_send(
    State(state): State<Arc<NotifyState>>,
    Json(payload): Json<SendRequest>,
) -> Result<Json<DispatchReport>, (StatusCode, String)> {
    let report = state
        .dispatcher
        .send(&payload.recipient, &payload.notification)
        .await
        .map_err(error_response)?;
    Ok(Json(report))
}

/// Report task activity for notification.
///
/// Session-side self-repair needs a live browser platform, so over HTTP
/// the outcome only reports `hasTokens`; the caller's session reacts to a
/// false value by running its own enable flow.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/notify/task-event",
    request_body = TaskEvent,
    responses(
        (status = 200, description = "Event processed, delivery best-effort", body = TaskNotificationOutcome)
    ),
    tag = "Notifications"
))]
pub async fn handle_task_event(
    State(state): State<Arc<NotifyState>>,
    Json(event): Json<TaskEvent>,
) -> Json<TaskNotificationOutcome> {
    Json(state.task_notifier.notify(&event, None).await)
}

// --- Presence ---

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceHeartbeat {
    pub user_id: String,
    pub connected: bool,
    pub visible: bool,
}

/// Record a presence heartbeat.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/notify/presence",
    request_body = PresenceHeartbeat,
    responses((status = 204, description = "Heartbeat recorded")),
    tag = "Notifications"
))]
pub async fn handle_presence(
    State(state): State<Arc<NotifyState>>,
    Json(heartbeat): Json<PresenceHeartbeat>,
) -> StatusCode {
    state
        .presence
        .update(&heartbeat.user_id, heartbeat.connected, heartbeat.visible);
    StatusCode::NO_CONTENT
}

// --- History ---

/// A history entry as served over the API. Unlike the stored document,
/// this carries the entry's id so clients can address read-state mutations.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryView {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: crate::models::NotificationType,
    pub read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub read_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<crate::models::HistoryEntry> for HistoryEntryView {
    fn from(entry: crate::models::HistoryEntry) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id,
            title: entry.title,
            body: entry.body,
            url: entry.url,
            kind: entry.kind,
            read: entry.read,
            created_at: entry.created_at,
            read_at: entry.read_at,
        }
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub entries: Vec<HistoryEntryView>,
    pub unread: usize,
}

/// List an owner's notification history, newest first.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/notify/history/{user_id}",
    params(("user_id" = String, Path, description = "Owner id")),
    responses((status = 200, description = "History entries", body = HistoryResponse)),
    tag = "Notifications"
))]
pub async fn handle_history_list(
    State(state): State<Arc<NotifyState>>,
    Path(user_id): Path<String>,
) -> Json<HistoryResponse> {
    let entries = state.history.list_for_owner(&user_id).await;
    let unread = entries.iter().filter(|e| !e.read).count();
    let entries = entries.into_iter().map(HistoryEntryView::from).collect();
    Json(HistoryResponse { entries, unread })
}

/// Mark one history entry read.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/notify/history/entry/{entry_id}/read",
    params(("entry_id" = String, Path, description = "History entry id")),
    responses(
        (status = 204, description = "Entry marked read"),
        (status = 500, description = "Store failure")
    ),
    tag = "Notifications"
))]
pub async fn handle_mark_read(
    State(state): State<Arc<NotifyState>>,
    Path(entry_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .history
        .mark_read(&entry_id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Revert one history entry to unread.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/notify/history/entry/{entry_id}/unread",
    params(("entry_id" = String, Path, description = "History entry id")),
    responses(
        (status = 204, description = "Entry reverted to unread"),
        (status = 500, description = "Store failure")
    ),
    tag = "Notifications"
))]
pub async fn handle_mark_unread(
    State(state): State<Arc<NotifyState>>,
    Path(entry_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .history
        .mark_unread(&entry_id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFlipResponse {
    pub updated: usize,
}

/// Mark all of an owner's entries read.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/notify/history/{user_id}/read-all",
    params(("user_id" = String, Path, description = "Owner id")),
    responses(
        (status = 200, description = "Entries updated", body = BulkFlipResponse),
        (status = 500, description = "Store failure")
    ),
    tag = "Notifications"
))]
pub async fn handle_mark_all_read(
    State(state): State<Arc<NotifyState>>,
    Path(user_id): Path<String>,
) -> Result<Json<BulkFlipResponse>, (StatusCode, String)> {
    let updated = state
        .history
        .mark_all_read(&user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(BulkFlipResponse { updated }))
}

/// Revert all of an owner's entries to unread.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/notify/history/{user_id}/unread-all",
    params(("user_id" = String, Path, description = "Owner id")),
    responses(
        (status = 200, description = "Entries updated", body = BulkFlipResponse),
        (status = 500, description = "Store failure")
    ),
    tag = "Notifications"
))]
pub async fn handle_mark_all_unread(
    State(state): State<Arc<NotifyState>>,
    Path(user_id): Path<String>,
) -> Result<Json<BulkFlipResponse>, (StatusCode, String)> {
    let updated = state
        .history
        .mark_all_unread(&user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(BulkFlipResponse { updated }))
}

/// Delete one history entry.
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/notify/history/entry/{entry_id}",
    params(("entry_id" = String, Path, description = "History entry id")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 404, description = "No such entry"),
        (status = 500, description = "Store failure")
    ),
    tag = "Notifications"
))]
pub async fn handle_delete_entry(
    State(state): State<Arc<NotifyState>>,
    Path(entry_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let deleted = state
        .history
        .delete(&entry_id)
        .await
        .map_err(error_response)?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "no such history entry".to_string()))
    }
}

// --- Preferences ---

/// Read an owner's notification preferences.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/notify/preferences/{user_id}",
    params(("user_id" = String, Path, description = "Owner id")),
    responses((status = 200, description = "Preferences (defaults when unset)", body = NotificationPreferences)),
    tag = "Notifications"
))]
pub async fn handle_get_preferences(
    State(state): State<Arc<NotifyState>>,
    Path(user_id): Path<String>,
) -> Json<NotificationPreferences> {
    Json(state.registry.preferences_for(&user_id).await)
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize)]
pub struct UpdatePreferencesRequest {
    pub preferences: BTreeMap<String, ChannelToggles>,
}

/// Update an owner's notification preferences. Types not mentioned keep
/// their stored toggles.
#[cfg_attr(feature = "openapi", utoipa::path(
    patch,
    path = "/notify/preferences/{user_id}",
    params(("user_id" = String, Path, description = "Owner id")),
    request_body = UpdatePreferencesRequest,
    responses(
        (status = 200, description = "Preferences after the merge", body = NotificationPreferences),
        (status = 500, description = "Store failure")
    ),
    tag = "Notifications"
))]
pub async fn handle_update_preferences(
    State(state): State<Arc<NotifyState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdatePreferencesRequest>,
) -> Result<Json<NotificationPreferences>, (StatusCode, String)> {
    let preferences = state
        .registry
        .update_preferences(&user_id, payload.preferences)
        .await
        .map_err(error_response)?;
    info!(owner = %user_id, "notification preferences updated");
    Ok(Json(preferences))
}

// --- Health ---

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness probe for the notification API.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/notify/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "Notifications"
))]
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
