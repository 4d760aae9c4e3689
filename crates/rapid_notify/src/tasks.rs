//! Task-event notification adapter.
//!
//! Translates task activity (new messages, estimates, status changes) into
//! notification envelopes and dispatches them. This adapter never fails the
//! caller: a task message must still post even when every notification
//! channel is down, so all dispatch errors are logged and swallowed.
//!
//! When the event's recipient is also the session making the call, the
//! adapter additionally self-repairs missing push registration: a dispatch
//! that found zero tokens triggers one `ensure_enabled` pass for that
//! session so the next event can go out over push.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::capability::ClientRuntime;
use crate::dispatch::MultiChannelDispatcher;
use crate::models::{NotificationEnvelope, NotificationType, Recipient};
use crate::permission::{PermissionOrchestrator, PushPlatform};

/// The kinds of task activity that produce a notification.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMessageKind {
    /// A chat message on the task thread.
    Message,
    /// A price or time estimate was attached.
    Estimate,
    /// A new task was created.
    TaskCreated,
    /// A task was submitted for review.
    TaskSubmitted,
    /// A test notification, for diagnostics.
    Test,
}

/// A task activity event, as reported by the task subsystem.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub task_id: String,
    pub sender_email: String,
    #[serde(default)]
    pub sender_role: Option<String>,
    pub recipient_email: String,
    #[serde(default)]
    pub recipient_role: Option<String>,
    #[serde(default)]
    pub message_content: Option<String>,
    pub message_kind: TaskMessageKind,
    /// Extra task fields (title, status) used to enrich the notification.
    #[serde(default)]
    pub task_data: Value,
}

impl TaskEvent {
    fn task_title(&self) -> Option<&str> {
        self.task_data.get("title").and_then(Value::as_str)
    }
}

/// The session identity of the caller reporting the event, when the event
/// comes in from an interactive session rather than a backend job.
pub struct CallerSession<'a> {
    pub email: &'a str,
    pub runtime: &'a ClientRuntime,
    pub platform: &'a dyn PushPlatform,
}

/// What a task-event notification resolved to. Advisory only.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNotificationOutcome {
    /// Whether at least one channel delivered.
    pub dispatched: bool,
    /// Whether the recipient had any registered push tokens.
    pub has_tokens: bool,
}

/// Bridges task activity into the notification dispatcher.
pub struct TaskEventNotifier {
    dispatcher: Arc<MultiChannelDispatcher>,
    orchestrator: Arc<PermissionOrchestrator>,
}

impl TaskEventNotifier {
    pub fn new(
        dispatcher: Arc<MultiChannelDispatcher>,
        orchestrator: Arc<PermissionOrchestrator>,
    ) -> Self {
        Self {
            dispatcher,
            orchestrator,
        }
    }

    /// Notify the event's recipient. Never returns an error; the task flow
    /// that emitted this event must not be disturbed by notification
    /// failures.
    pub async fn notify(
        &self,
        event: &TaskEvent,
        caller: Option<CallerSession<'_>>,
    ) -> TaskNotificationOutcome {
        let recipient = Recipient {
            user_id: event.recipient_email.clone(),
            email: event.recipient_email.clone(),
            name: None,
            phone: None,
        };
        let envelope = self.envelope_for(event);

        let report = match self.dispatcher.send(&recipient, &envelope).await {
            Ok(report) => report,
            Err(err) => {
                warn!(task_id = %event.task_id, error = %err,
                    "task notification dispatch failed, task flow unaffected");
                return TaskNotificationOutcome {
                    dispatched: false,
                    has_tokens: true,
                };
            }
        };

        let outcome = TaskNotificationOutcome {
            dispatched: report.delivered(),
            has_tokens: report.has_tokens,
        };

        // Self-repair is only safe for the caller's own registration; one
        // session cannot obtain push permission on another user's behalf.
        if !report.has_tokens {
            if let Some(caller) = caller {
                if caller.email.eq_ignore_ascii_case(&event.recipient_email) {
                    self.repair_registration(caller).await;
                } else {
                    debug!(recipient = %event.recipient_email,
                        "recipient has no tokens but is not the caller, nothing to repair");
                }
            }
        }

        info!(
            task_id = %event.task_id,
            kind = ?event.message_kind,
            dispatched = outcome.dispatched,
            has_tokens = outcome.has_tokens,
            "task event notified"
        );
        outcome
    }

    async fn repair_registration(&self, caller: CallerSession<'_>) {
        match self
            .orchestrator
            .ensure_enabled(caller.platform, caller.runtime, Some(caller.email))
            .await
        {
            Ok(outcome) if outcome.enabled => {
                info!(owner = %caller.email, "re-registered missing push token");
            }
            Ok(outcome) => {
                debug!(owner = %caller.email, reason = ?outcome.reason,
                    "push registration repair not possible");
            }
            Err(err) => {
                warn!(owner = %caller.email, error = %err, "push registration repair failed");
            }
        }
    }

    fn envelope_for(&self, event: &TaskEvent) -> NotificationEnvelope {
        let task_label = event.task_title().unwrap_or("your task");
        let (title, body) = match event.message_kind {
            TaskMessageKind::Message => (
                format!("New message on {task_label}"),
                event
                    .message_content
                    .clone()
                    .unwrap_or_else(|| "You have a new message".to_string()),
            ),
            TaskMessageKind::Estimate => (
                format!("New estimate for {task_label}"),
                event
                    .message_content
                    .clone()
                    .unwrap_or_else(|| "An estimate was added to your task".to_string()),
            ),
            TaskMessageKind::TaskCreated => (
                "New task created".to_string(),
                format!("{task_label} was created"),
            ),
            TaskMessageKind::TaskSubmitted => (
                "Task submitted".to_string(),
                format!("{task_label} was submitted for review"),
            ),
            TaskMessageKind::Test => (
                "Test notification".to_string(),
                "Notifications are working".to_string(),
            ),
        };

        let mut data = HashMap::new();
        data.insert("taskId".to_string(), event.task_id.clone());
        data.insert(
            "messageType".to_string(),
            serde_json::to_string(&event.message_kind)
                .unwrap_or_default()
                .trim_matches('"')
                .to_string(),
        );

        let mut envelope = NotificationEnvelope::new(title, body, NotificationType::TaskMessages);
        envelope.data = data;
        envelope.action_url = Some(format!("/dashboard/tasks/{}", event.task_id));
        envelope
    }
}
