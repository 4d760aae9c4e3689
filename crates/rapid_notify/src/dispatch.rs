// --- File: crates/rapid_notify/src/dispatch.rs ---
//! Multi-channel notification dispatch.
//!
//! One `send` call fans a notification out over every applicable channel in
//! a fixed order: presence (same-session toast), push, email, SMS. Channels
//! fail independently; one channel's failure never prevents the later
//! channels from being attempted, and the aggregate result reports each
//! outcome separately. History is recorded best-effort at the end.

use std::sync::Arc;
use tracing::{debug, info, warn};

use rapid_common::services::{ChannelFactory, PushMessage};

use crate::error::NotifyError;
use crate::history::NotificationHistory;
use crate::models::{
    Channel, ChannelResult, DispatchReport, NotificationEnvelope, Recipient,
};
use crate::presence::{ForegroundNotification, PresenceTracker};
use crate::registry::TokenRegistry;

/// Fans a notification out across the configured channels.
pub struct MultiChannelDispatcher {
    registry: Arc<TokenRegistry>,
    history: Arc<NotificationHistory>,
    presence: Arc<PresenceTracker>,
    channels: Arc<dyn ChannelFactory>,
}

impl MultiChannelDispatcher {
    pub fn new(
        registry: Arc<TokenRegistry>,
        history: Arc<NotificationHistory>,
        presence: Arc<PresenceTracker>,
        channels: Arc<dyn ChannelFactory>,
    ) -> Self {
        Self {
            registry,
            history,
            presence,
            channels,
        }
    }

    /// Dispatch an envelope to a recipient.
    ///
    /// Channel gating, in order:
    /// - presence: attempted when the recipient has a live, visible session
    /// - push: the recipient's `mobile` toggle for this type, and at least
    ///   one registered token
    /// - email: the recipient's `email` toggle for this type
    /// - SMS: urgent envelopes only, and only when a phone number is known
    ///
    /// A disabled channel (factory returns `None`) is skipped silently; a
    /// gated-off channel is skipped silently; an attempted channel that
    /// fails contributes a failure result. The only error this method
    /// itself raises is [`NotifyError::Unauthenticated`] for a recipient
    /// with no identity.
    pub async fn send(
        &self,
        recipient: &Recipient,
        envelope: &NotificationEnvelope,
    ) -> Result<DispatchReport, NotifyError> {
        if recipient.user_id.trim().is_empty() || recipient.email.trim().is_empty() {
            return Err(NotifyError::Unauthenticated(
                "recipient is missing a user id or email".to_string(),
            ));
        }

        let toggles = self.registry.preferences_for(&recipient.email).await.allows(envelope.kind);
        let mut results = Vec::new();
        let mut has_tokens = true;

        if self.presence.is_online(&recipient.user_id) {
            results.push(self.attempt_presence(recipient, envelope));
        }

        if toggles.mobile {
            if let Some(push) = self.channels.push_service() {
                let (result, tokens_found) = self.attempt_push(&*push, recipient, envelope).await;
                has_tokens = tokens_found;
                results.push(result);
            }
        }

        if toggles.email {
            if let Some(email) = self.channels.email_service() {
                results.push(self.attempt_email(&*email, recipient, envelope).await);
            }
        }

        if envelope.urgent {
            if let (Some(sms), Some(phone)) = (self.channels.sms_service(), &recipient.phone) {
                results.push(self.attempt_sms(&*sms, phone, envelope).await);
            }
        }

        let history_id = match self
            .history
            .record(
                &recipient.user_id,
                &envelope.title,
                &envelope.body,
                envelope.action_url.as_deref(),
                envelope.kind,
            )
            .await
        {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(user_id = %recipient.user_id, error = %err,
                    "history write failed, dispatch result unaffected");
                None
            }
        };

        let report = DispatchReport {
            results,
            has_tokens,
            history_id,
        };
        info!(
            user_id = %recipient.user_id,
            kind = envelope.kind.as_key(),
            delivered = report.delivered(),
            channels = report.results.len(),
            "notification dispatched"
        );
        Ok(report)
    }

    fn attempt_presence(
        &self,
        recipient: &Recipient,
        envelope: &NotificationEnvelope,
    ) -> ChannelResult {
        let mut notification = ForegroundNotification::new(
            envelope.title.clone(),
            envelope.body.clone(),
            envelope.kind,
        );
        notification.icon = envelope.icon.clone();
        notification.url = envelope.action_url.clone();

        match self.presence.deliver(&recipient.user_id, notification) {
            Ok(sessions) => {
                ChannelResult::success(Channel::Presence, format!("{sessions} session(s)"))
            }
            Err(reason) => ChannelResult::failure(Channel::Presence, reason),
        }
    }

    async fn attempt_push(
        &self,
        push: &dyn rapid_common::services::PushDeliveryService<
            Error = rapid_common::services::BoxedError,
        >,
        recipient: &Recipient,
        envelope: &NotificationEnvelope,
    ) -> (ChannelResult, bool) {
        let tokens = match self.registry.token_values_for_owner(&recipient.email).await {
            Ok(tokens) => tokens,
            Err(err) => {
                return (
                    ChannelResult::failure(Channel::Push, format!("token lookup failed: {err}")),
                    true,
                );
            }
        };

        if tokens.is_empty() {
            debug!(email = %recipient.email, "no registered tokens, skipping push");
            return (
                ChannelResult::failure(Channel::Push, "no registered tokens"),
                false,
            );
        }

        let message = PushMessage {
            title: envelope.title.clone(),
            body: envelope.body.clone(),
            icon: envelope.icon.clone(),
            data: envelope.data.clone(),
        };

        match push.send_to_tokens(&tokens, &message).await {
            Ok(fanout) if fanout.delivered > 0 => (
                ChannelResult::success(
                    Channel::Push,
                    format!("{}/{} devices", fanout.delivered, fanout.delivered + fanout.failed),
                ),
                true,
            ),
            Ok(fanout) => (
                ChannelResult::failure(
                    Channel::Push,
                    format!("all {} device sends failed", fanout.failed),
                ),
                true,
            ),
            Err(err) => (
                ChannelResult::failure(Channel::Push, err.to_string()),
                true,
            ),
        }
    }

    async fn attempt_email(
        &self,
        email: &dyn rapid_common::services::EmailDeliveryService<
            Error = rapid_common::services::BoxedError,
        >,
        recipient: &Recipient,
        envelope: &NotificationEnvelope,
    ) -> ChannelResult {
        let body = envelope.email_body.as_deref().unwrap_or(&envelope.body);
        match email
            .send_email(
                &recipient.email,
                recipient.name.as_deref(),
                &envelope.title,
                body,
                envelope.action_url.as_deref(),
            )
            .await
        {
            Ok(outcome) => ChannelResult::success(Channel::Email, outcome.status),
            Err(err) => ChannelResult::failure(Channel::Email, err.to_string()),
        }
    }

    async fn attempt_sms(
        &self,
        sms: &dyn rapid_common::services::SmsDeliveryService<
            Error = rapid_common::services::BoxedError,
        >,
        phone: &str,
        envelope: &NotificationEnvelope,
    ) -> ChannelResult {
        let fallback = format!("{}: {}", envelope.title, envelope.body);
        let body = envelope.sms_body.as_deref().unwrap_or(&fallback);
        match sms.send_sms(phone, body).await {
            Ok(outcome) => ChannelResult::success(Channel::Sms, outcome.status),
            Err(err) => ChannelResult::failure(Channel::Sms, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapid_common::services::{
        BoxFuture, BoxedError, DeliveryOutcome, EmailDeliveryService, PushDeliveryService,
        PushFanout, SmsDeliveryService,
    };
    use rapid_store::MemoryStore;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::models::{ChannelToggles, DeviceMetadata, NotificationType};

    #[derive(Default)]
    struct MockPush {
        calls: AtomicUsize,
        fail_all: bool,
    }

    impl PushDeliveryService for MockPush {
        type Error = BoxedError;
        fn send_to_tokens(
            &self,
            tokens: &[String],
            _message: &PushMessage,
        ) -> BoxFuture<'_, PushFanout, BoxedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let count = tokens.len();
            let fail_all = self.fail_all;
            Box::pin(async move {
                if fail_all {
                    Ok(PushFanout {
                        delivered: 0,
                        failed: count,
                        message_ids: Vec::new(),
                    })
                } else {
                    Ok(PushFanout {
                        delivered: count,
                        failed: 0,
                        message_ids: (0..count).map(|i| format!("msg-{i}")).collect(),
                    })
                }
            })
        }
    }

    #[derive(Default)]
    struct MockEmail {
        calls: AtomicUsize,
    }

    impl EmailDeliveryService for MockEmail {
        type Error = BoxedError;
        fn send_email(
            &self,
            _to: &str,
            _recipient_name: Option<&str>,
            _subject: &str,
            _body: &str,
            _action_url: Option<&str>,
        ) -> BoxFuture<'_, DeliveryOutcome, BoxedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Ok(DeliveryOutcome {
                    id: "email-1".into(),
                    status: "accepted".into(),
                })
            })
        }
    }

    #[derive(Default)]
    struct MockSms {
        calls: AtomicUsize,
    }

    impl SmsDeliveryService for MockSms {
        type Error = BoxedError;
        fn send_sms(&self, _to: &str, _body: &str) -> BoxFuture<'_, DeliveryOutcome, BoxedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Ok(DeliveryOutcome {
                    id: "sms-1".into(),
                    status: "queued".into(),
                })
            })
        }
    }

    struct MockChannels {
        push: Option<Arc<MockPush>>,
        email: Option<Arc<MockEmail>>,
        sms: Option<Arc<MockSms>>,
    }

    impl ChannelFactory for MockChannels {
        fn push_service(
            &self,
        ) -> Option<Arc<dyn PushDeliveryService<Error = BoxedError>>> {
            self.push
                .clone()
                .map(|p| p as Arc<dyn PushDeliveryService<Error = BoxedError>>)
        }
        fn email_service(
            &self,
        ) -> Option<Arc<dyn EmailDeliveryService<Error = BoxedError>>> {
            self.email
                .clone()
                .map(|e| e as Arc<dyn EmailDeliveryService<Error = BoxedError>>)
        }
        fn sms_service(&self) -> Option<Arc<dyn SmsDeliveryService<Error = BoxedError>>> {
            self.sms
                .clone()
                .map(|s| s as Arc<dyn SmsDeliveryService<Error = BoxedError>>)
        }
    }

    struct Fixture {
        dispatcher: MultiChannelDispatcher,
        registry: Arc<TokenRegistry>,
        history: Arc<NotificationHistory>,
        presence: Arc<PresenceTracker>,
        push: Arc<MockPush>,
        email: Arc<MockEmail>,
        sms: Arc<MockSms>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(TokenRegistry::new(store.clone()));
        let history = Arc::new(NotificationHistory::new(store));
        let presence = Arc::new(PresenceTracker::new());
        let push = Arc::new(MockPush::default());
        let email = Arc::new(MockEmail::default());
        let sms = Arc::new(MockSms::default());
        let channels = Arc::new(MockChannels {
            push: Some(push.clone()),
            email: Some(email.clone()),
            sms: Some(sms.clone()),
        });
        let dispatcher = MultiChannelDispatcher::new(
            registry.clone(),
            history.clone(),
            presence.clone(),
            channels,
        );
        Fixture {
            dispatcher,
            registry,
            history,
            presence,
            push,
            email,
            sms,
        }
    }

    fn recipient() -> Recipient {
        Recipient {
            user_id: "user-1".into(),
            email: "user@example.com".into(),
            name: Some("User".into()),
            phone: Some("+15550001111".into()),
        }
    }

    fn envelope() -> NotificationEnvelope {
        NotificationEnvelope::new("New message", "You have mail", NotificationType::TaskMessages)
    }

    #[tokio::test]
    async fn missing_identity_is_the_only_send_error() {
        let fx = fixture();
        let mut r = recipient();
        r.user_id = " ".into();
        let err = fx.dispatcher.send(&r, &envelope()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn push_and_email_fan_out_and_history_is_recorded() {
        let fx = fixture();
        fx.registry
            .upsert_token("tok-1", Some("user@example.com"), &DeviceMetadata::default())
            .await
            .unwrap();

        let report = fx.dispatcher.send(&recipient(), &envelope()).await.unwrap();

        assert!(report.delivered());
        assert!(report.has_tokens);
        assert!(report.history_id.is_some());
        assert_eq!(fx.push.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.email.calls.load(Ordering::SeqCst), 1);
        // Not urgent, so no SMS.
        assert_eq!(fx.sms.calls.load(Ordering::SeqCst), 0);

        let entries = fx.history.list_for_owner("user-1").await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "New message");
        assert!(!entries[0].read);
    }

    #[tokio::test]
    async fn zero_tokens_marks_has_tokens_false_but_email_still_goes_out() {
        let fx = fixture();

        let report = fx.dispatcher.send(&recipient(), &envelope()).await.unwrap();

        assert!(!report.has_tokens);
        assert!(report.delivered());
        assert_eq!(fx.push.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.email.calls.load(Ordering::SeqCst), 1);
        let push_result = report
            .results
            .iter()
            .find(|r| r.channel == Channel::Push)
            .unwrap();
        assert!(!push_result.success);
    }

    #[tokio::test]
    async fn urgent_envelope_adds_the_sms_channel() {
        let fx = fixture();
        let mut env = envelope();
        env.urgent = true;

        let report = fx.dispatcher.send(&recipient(), &env).await.unwrap();

        assert_eq!(fx.sms.calls.load(Ordering::SeqCst), 1);
        assert!(report.results.iter().any(|r| r.channel == Channel::Sms && r.success));
    }

    #[tokio::test]
    async fn urgent_without_phone_skips_sms_silently() {
        let fx = fixture();
        let mut env = envelope();
        env.urgent = true;
        let mut r = recipient();
        r.phone = None;

        let report = fx.dispatcher.send(&r, &env).await.unwrap();

        assert_eq!(fx.sms.calls.load(Ordering::SeqCst), 0);
        assert!(!report.results.iter().any(|r| r.channel == Channel::Sms));
    }

    #[tokio::test]
    async fn preferences_gate_push_and_email_independently() {
        let fx = fixture();
        fx.registry
            .upsert_token("tok-1", Some("user@example.com"), &DeviceMetadata::default())
            .await
            .unwrap();
        let mut toggles = BTreeMap::new();
        toggles.insert(
            "taskMessages".to_string(),
            ChannelToggles {
                mobile: false,
                email: true,
            },
        );
        fx.registry
            .update_preferences("user@example.com", toggles)
            .await
            .unwrap();

        let report = fx.dispatcher.send(&recipient(), &envelope()).await.unwrap();

        assert_eq!(fx.push.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.email.calls.load(Ordering::SeqCst), 1);
        // Push was gated off, not attempted-and-failed.
        assert!(!report.results.iter().any(|r| r.channel == Channel::Push));
        // Gating off push says nothing about token registration.
        assert!(report.has_tokens);
    }

    #[tokio::test]
    async fn online_recipient_gets_a_foreground_toast_first() {
        let fx = fixture();
        fx.presence.update("user-1", true, true);
        let mut rx = fx.presence.subscribe("user-1");

        let report = fx.dispatcher.send(&recipient(), &envelope()).await.unwrap();

        assert_eq!(report.results[0].channel, Channel::Presence);
        assert!(report.results[0].success);
        let toast = rx.recv().await.unwrap();
        assert_eq!(toast.title, "New message");
    }

    #[tokio::test]
    async fn all_device_sends_failing_is_a_push_failure_not_a_send_error() {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(TokenRegistry::new(store.clone()));
        let history = Arc::new(NotificationHistory::new(store));
        let push = Arc::new(MockPush {
            calls: AtomicUsize::new(0),
            fail_all: true,
        });
        let channels = Arc::new(MockChannels {
            push: Some(push.clone()),
            email: None,
            sms: None,
        });
        let dispatcher = MultiChannelDispatcher::new(
            registry.clone(),
            history,
            Arc::new(PresenceTracker::new()),
            channels,
        );
        registry
            .upsert_token("tok-stale", Some("user@example.com"), &DeviceMetadata::default())
            .await
            .unwrap();

        let report = dispatcher.send(&recipient(), &envelope()).await.unwrap();

        assert!(!report.delivered());
        assert!(report.has_tokens);
        let push_result = report
            .results
            .iter()
            .find(|r| r.channel == Channel::Push)
            .unwrap();
        assert!(!push_result.success);
    }

    struct ThrowingPush;

    impl PushDeliveryService for ThrowingPush {
        type Error = BoxedError;
        fn send_to_tokens(
            &self,
            _tokens: &[String],
            _message: &PushMessage,
        ) -> BoxFuture<'_, PushFanout, BoxedError> {
            Box::pin(async {
                Err(BoxedError(Box::new(std::io::Error::other(
                    "transport exploded",
                ))))
            })
        }
    }

    struct ThrowingChannels {
        email: Arc<MockEmail>,
    }

    impl ChannelFactory for ThrowingChannels {
        fn push_service(&self) -> Option<Arc<dyn PushDeliveryService<Error = BoxedError>>> {
            Some(Arc::new(ThrowingPush))
        }
        fn email_service(&self) -> Option<Arc<dyn EmailDeliveryService<Error = BoxedError>>> {
            Some(self.email.clone())
        }
        fn sms_service(&self) -> Option<Arc<dyn SmsDeliveryService<Error = BoxedError>>> {
            None
        }
    }

    #[tokio::test]
    async fn push_error_does_not_prevent_the_email_attempt() {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(TokenRegistry::new(store.clone()));
        let email = Arc::new(MockEmail::default());
        let dispatcher = MultiChannelDispatcher::new(
            registry.clone(),
            Arc::new(NotificationHistory::new(store)),
            Arc::new(PresenceTracker::new()),
            Arc::new(ThrowingChannels {
                email: email.clone(),
            }),
        );
        registry
            .upsert_token("tok-1", Some("user@example.com"), &DeviceMetadata::default())
            .await
            .unwrap();

        let report = dispatcher.send(&recipient(), &envelope()).await.unwrap();

        let push_result = report
            .results
            .iter()
            .find(|r| r.channel == Channel::Push)
            .unwrap();
        assert!(!push_result.success);
        let email_result = report
            .results
            .iter()
            .find(|r| r.channel == Channel::Email)
            .unwrap();
        assert!(email_result.success);
        assert!(report.delivered());
    }

    #[tokio::test]
    async fn disabled_channels_are_skipped_without_results() {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(TokenRegistry::new(store.clone()));
        let dispatcher = MultiChannelDispatcher::new(
            registry,
            Arc::new(NotificationHistory::new(store)),
            Arc::new(PresenceTracker::new()),
            Arc::new(MockChannels {
                push: None,
                email: None,
                sms: None,
            }),
        );

        let report = dispatcher.send(&recipient(), &envelope()).await.unwrap();

        assert!(report.results.is_empty());
        assert!(report.has_tokens);
        assert!(report.history_id.is_some());
    }
}
