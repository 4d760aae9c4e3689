// --- File: crates/rapid_notify/src/models.rs ---

// Data structures shared across the notification core. Field names follow
// the document-store schema (camelCase), so these types serialize directly
// into store documents and API payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Name of the document collection holding push tokens.
pub const TOKENS_COLLECTION: &str = "pushTokens";
/// Name of the document collection holding per-owner preferences.
pub const PREFERENCES_COLLECTION: &str = "notificationPreferences";
/// Name of the document collection holding the notification history.
pub const HISTORY_COLLECTION: &str = "notificationHistory";

/// A registered push token.
///
/// A token value maps to at most one document; re-registration of the same
/// token updates metadata rather than duplicating. A single owner may have
/// many tokens (multi-device).
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushToken {
    /// The opaque token value issued by the push service.
    pub token: String,

    /// The owner's email, if known at registration time.
    #[serde(default)]
    pub email: Option<String>,

    /// When the token was first registered. Never changed by later upserts.
    pub created_at: DateTime<Utc>,

    /// Refreshed on every successful fetch (refresh, app reopen).
    pub last_used: DateTime<Utc>,

    /// The registering browser's user-agent string.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Whether the registering device is a mobile device.
    #[serde(default)]
    pub is_mobile: bool,

    /// Whether the registering device runs iOS.
    #[serde(rename = "isIOS", default)]
    pub is_ios: bool,
}

/// Device metadata attached to a token at registration time. Advisory only:
/// last-writer-wins on concurrent upserts of the same token is acceptable.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetadata {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub is_mobile: bool,
    #[serde(rename = "isIOS", default)]
    pub is_ios: bool,
}

/// The recognized notification types.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationType {
    /// A new blog post was published.
    #[serde(rename = "blogNotifications")]
    BlogNotifications,
    /// A branding kit finished rendering.
    #[serde(rename = "brandingKitReady")]
    BrandingKitReady,
    /// Activity on a task (message, estimate, status change).
    #[serde(rename = "taskMessages")]
    TaskMessages,
}

impl NotificationType {
    /// The preferences-map key for this type.
    pub fn as_key(&self) -> &'static str {
        match self {
            NotificationType::BlogNotifications => "blogNotifications",
            NotificationType::BrandingKitReady => "brandingKitReady",
            NotificationType::TaskMessages => "taskMessages",
        }
    }

    /// All recognized types.
    pub fn all() -> [NotificationType; 3] {
        [
            NotificationType::BlogNotifications,
            NotificationType::BrandingKitReady,
            NotificationType::TaskMessages,
        ]
    }
}

/// Per-type channel toggles.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelToggles {
    /// Deliver over push to mobile/desktop devices.
    pub mobile: bool,
    /// Deliver over email.
    pub email: bool,
}

impl Default for ChannelToggles {
    /// Absent preferences default to fully enabled, for backward
    /// compatibility with owners who registered before preferences existed.
    fn default() -> Self {
        Self {
            mobile: true,
            email: true,
        }
    }
}

/// An owner's notification preferences document.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    /// Map of notification-type key to channel toggles. Keys this service
    /// does not recognize are preserved untouched.
    #[serde(default)]
    pub preferences: BTreeMap<String, ChannelToggles>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self::fully_enabled()
    }
}

impl NotificationPreferences {
    /// The defaults seeded on first registration: every recognized type
    /// enabled on every channel.
    pub fn fully_enabled() -> Self {
        let mut preferences = BTreeMap::new();
        for kind in NotificationType::all() {
            preferences.insert(kind.as_key().to_string(), ChannelToggles::default());
        }
        Self {
            preferences,
            created_at: None,
            updated_at: None,
        }
    }

    /// The toggles for a notification type, defaulting to fully enabled
    /// when the type has no entry.
    pub fn allows(&self, kind: NotificationType) -> ChannelToggles {
        self.preferences
            .get(kind.as_key())
            .copied()
            .unwrap_or_default()
    }
}

/// A persisted notification-history entry.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Document id. Assigned by the store, not part of the document body.
    #[serde(skip)]
    pub id: String,

    /// The owner this entry belongs to.
    pub user_id: String,

    pub title: String,

    pub body: String,

    /// Optional deep-link opened when the entry is clicked.
    #[serde(default)]
    pub url: Option<String>,

    /// The notification type tag.
    #[serde(rename = "type")]
    pub kind: NotificationType,

    /// Read flag; defaults to false on creation.
    #[serde(default)]
    pub read: bool,

    pub created_at: DateTime<Utc>,

    /// Set only when `read` transitions to true; cleared when reverted.
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

/// The transient unit handed to the dispatcher. Never persisted directly;
/// it is projected into channel-specific requests and, separately, into a
/// [`HistoryEntry`].
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEnvelope {
    pub title: String,

    pub body: String,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(rename = "type")]
    pub kind: NotificationType,

    /// Urgent envelopes additionally go out over SMS.
    #[serde(default)]
    pub urgent: bool,

    /// Arbitrary data payload carried by the push channel (deep-link ids).
    #[serde(default)]
    pub data: HashMap<String, String>,

    /// Optional action URL, persisted to history and linked from email.
    #[serde(default)]
    pub action_url: Option<String>,

    /// Channel-specific body override for email.
    #[serde(default)]
    pub email_body: Option<String>,

    /// Channel-specific body override for SMS.
    #[serde(default)]
    pub sms_body: Option<String>,
}

impl NotificationEnvelope {
    /// A minimal envelope with everything optional left empty.
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        kind: NotificationType,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: None,
            kind,
            urgent: false,
            data: HashMap::new(),
            action_url: None,
            email_body: None,
            sms_body: None,
        }
    }
}

/// The recipient of a dispatch.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    /// Stable owner id used to key history and preferences.
    pub user_id: String,

    /// Email address; also the key tokens are registered under.
    pub email: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Phone number for the urgent-only SMS channel.
    #[serde(default)]
    pub phone: Option<String>,
}

/// The delivery channels attempted by the dispatcher, in order.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Same-session delivery to a currently-open tab.
    Presence,
    /// Web push via the owner's registered tokens.
    Push,
    /// Email, the universal fallback.
    Email,
    /// SMS, urgent envelopes only.
    Sms,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Presence => write!(f, "presence"),
            Channel::Push => write!(f, "push"),
            Channel::Email => write!(f, "email"),
            Channel::Sms => write!(f, "sms"),
        }
    }
}

/// The outcome of one channel attempt.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelResult {
    pub channel: Channel,
    pub success: bool,
    /// Failure reason or delivery detail, for the UI's secondary surface.
    #[serde(default)]
    pub detail: Option<String>,
}

impl ChannelResult {
    pub fn success(channel: Channel, detail: impl Into<String>) -> Self {
        Self {
            channel,
            success: true,
            detail: Some(detail.into()),
        }
    }

    pub fn failure(channel: Channel, detail: impl Into<String>) -> Self {
        Self {
            channel,
            success: false,
            detail: Some(detail.into()),
        }
    }
}

/// Aggregate result of a dispatch.
///
/// Overall success means "at least one channel succeeded"; a push-specific
/// failure is non-fatal to callers.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    /// Per-channel outcomes, in attempt order. Channels that were not
    /// attempted (disabled, gated off) do not appear.
    pub results: Vec<ChannelResult>,

    /// False when the push channel found zero registered tokens for the
    /// recipient; drives the task adapter's self-repair.
    pub has_tokens: bool,

    /// Id of the history entry recorded for this dispatch, when the write
    /// succeeded.
    pub history_id: Option<String>,
}

impl DispatchReport {
    /// Whether at least one channel succeeded.
    pub fn delivered(&self) -> bool {
        self.results.iter().any(|r| r.success)
    }
}
