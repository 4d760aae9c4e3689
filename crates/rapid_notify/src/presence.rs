//! In-session presence and foreground delivery.
//!
//! When the recipient has an open, visible session, a notification is
//! handed to that session directly instead of (or in addition to) going
//! out over push. Each owner gets a broadcast channel; subscribing sessions
//! render the payload as an in-app toast.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::NotificationType;

/// Buffered foreground notifications per subscriber before lagging.
const FOREGROUND_CHANNEL_CAPACITY: usize = 32;

/// The liveness facts a session reports as a heartbeat.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceStatus {
    /// Whether the session's realtime connection is open.
    pub connected: bool,
    /// Whether the tab is currently visible (not backgrounded).
    pub visible: bool,
    /// When this status was last reported.
    pub last_seen: DateTime<Utc>,
}

/// A notification delivered to a live session for in-app rendering.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForegroundNotification {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub created_at: DateTime<Utc>,
}

impl ForegroundNotification {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        kind: NotificationType,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            body: body.into(),
            icon: None,
            url: None,
            kind,
            created_at: Utc::now(),
        }
    }
}

/// Tracks which owners have a live, visible session and routes foreground
/// notifications to them.
pub struct PresenceTracker {
    sessions: RwLock<HashMap<String, PresenceStatus>>,
    channels: Mutex<HashMap<String, broadcast::Sender<ForegroundNotification>>>,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Record a presence heartbeat for an owner.
    pub fn update(&self, owner: &str, connected: bool, visible: bool) {
        let status = PresenceStatus {
            connected,
            visible,
            last_seen: Utc::now(),
        };
        // Recover poisoned guards throughout; the maps stay structurally
        // valid when another thread panicked mid-update.
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(owner.to_string(), status);
    }

    /// Whether the owner currently has a connected, visible session.
    ///
    /// Both flags must hold: a connected but backgrounded tab would render
    /// the toast where nobody sees it, so those go out over push instead.
    pub fn is_online(&self, owner: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(owner)
            .map(|status| status.connected && status.visible)
            .unwrap_or(false)
    }

    /// The last reported status for an owner, if any.
    pub fn status(&self, owner: &str) -> Option<PresenceStatus> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(owner)
            .copied()
    }

    /// Subscribe a session to the owner's foreground notifications.
    pub fn subscribe(&self, owner: &str) -> broadcast::Receiver<ForegroundNotification> {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(owner.to_string())
            .or_insert_with(|| broadcast::channel(FOREGROUND_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Deliver a foreground notification to the owner's sessions.
    ///
    /// # Returns
    ///
    /// `Ok` with the number of sessions reached, or an error string when no
    /// session is subscribed.
    pub fn deliver(
        &self,
        owner: &str,
        notification: ForegroundNotification,
    ) -> Result<usize, String> {
        let channels = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let sender = channels
            .get(owner)
            .ok_or_else(|| "no active session".to_string())?;
        match sender.send(notification) {
            Ok(receivers) => {
                debug!(owner = %owner, receivers, "delivered foreground notification");
                Ok(receivers)
            }
            Err(_) => Err("no active session".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_requires_connected_and_visible() {
        let tracker = PresenceTracker::new();
        assert!(!tracker.is_online("user@example.com"));

        tracker.update("user@example.com", true, false);
        assert!(!tracker.is_online("user@example.com"));

        tracker.update("user@example.com", false, true);
        assert!(!tracker.is_online("user@example.com"));

        tracker.update("user@example.com", true, true);
        assert!(tracker.is_online("user@example.com"));
    }

    #[tokio::test]
    async fn delivers_to_subscribed_sessions() {
        let tracker = PresenceTracker::new();
        let mut rx = tracker.subscribe("user@example.com");

        let note = ForegroundNotification::new(
            "New message",
            "You have a new task message",
            NotificationType::TaskMessages,
        );
        let reached = tracker.deliver("user@example.com", note.clone()).unwrap();
        assert_eq!(reached, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, note.id);
        assert_eq!(received.title, "New message");
    }

    #[test]
    fn delivery_without_session_reports_no_active_session() {
        let tracker = PresenceTracker::new();
        let note = ForegroundNotification::new("t", "b", NotificationType::BlogNotifications);
        let err = tracker.deliver("nobody@example.com", note).unwrap_err();
        assert_eq!(err, "no active session");
    }

    #[test]
    fn dropped_subscriber_counts_as_offline_channel() {
        let tracker = PresenceTracker::new();
        let rx = tracker.subscribe("user@example.com");
        drop(rx);

        let note = ForegroundNotification::new("t", "b", NotificationType::BlogNotifications);
        assert!(tracker.deliver("user@example.com", note).is_err());
    }
}
