// Only compile this module if the 'openapi' feature is enabled
#![cfg(feature = "openapi")]

use utoipa::OpenApi;

use crate::capability::{Capability, ClientRuntime, PlatformFamily, PushSupport};
use crate::diagnostics::{DiagnosticsReport, ProbeResult};
use crate::handlers::{
    BulkFlipResponse, HealthResponse, HistoryEntryView, HistoryResponse, PresenceHeartbeat,
    RegisterTokenRequest, RegisterTokenResponse, SendRequest, UpdatePreferencesRequest,
};
use crate::models::{
    Channel, ChannelResult, ChannelToggles, DeviceMetadata, DispatchReport,
    NotificationEnvelope, NotificationPreferences, NotificationType, PushToken, Recipient,
};
use crate::permission::{EnableOutcome, PermissionState};
use crate::tasks::{TaskEvent, TaskMessageKind, TaskNotificationOutcome};

/// OpenAPI definition for the notification API.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::handle_classify,
        crate::handlers::handle_register_token,
        crate::handlers::handle_send,
        crate::handlers::handle_task_event,
        crate::handlers::handle_presence,
        crate::handlers::handle_history_list,
        crate::handlers::handle_mark_read,
        crate::handlers::handle_mark_unread,
        crate::handlers::handle_mark_all_read,
        crate::handlers::handle_mark_all_unread,
        crate::handlers::handle_delete_entry,
        crate::handlers::handle_get_preferences,
        crate::handlers::handle_update_preferences,
        crate::handlers::handle_health,
    ),
    components(schemas(
        ClientRuntime,
        Capability,
        PlatformFamily,
        PushSupport,
        PermissionState,
        EnableOutcome,
        PushToken,
        DeviceMetadata,
        NotificationType,
        ChannelToggles,
        NotificationPreferences,
        NotificationEnvelope,
        Recipient,
        Channel,
        ChannelResult,
        DispatchReport,
        HistoryEntryView,
        TaskEvent,
        TaskMessageKind,
        TaskNotificationOutcome,
        DiagnosticsReport,
        ProbeResult,
        RegisterTokenRequest,
        RegisterTokenResponse,
        SendRequest,
        PresenceHeartbeat,
        HistoryResponse,
        BulkFlipResponse,
        UpdatePreferencesRequest,
        HealthResponse,
    )),
    tags(
        (name = "Notifications", description = "Multi-channel notification delivery API")
    )
)]
pub struct NotifyApiDoc;
