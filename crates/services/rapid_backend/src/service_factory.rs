// --- File: crates/services/rapid_backend/src/service_factory.rs ---
//! Channel factory implementation.
//!
//! Builds the concrete delivery services (FCM push, HTTP email, Twilio SMS)
//! from the application configuration and exposes them through the
//! [`ChannelFactory`] trait. Each channel is wrapped in a small adapter
//! that erases its concrete error type behind [`BoxedError`], so the
//! dispatcher stays independent of any provider crate.
//!
//! A channel whose runtime flag is off, or whose configuration section is
//! missing, simply produces `None`; the dispatcher skips it.

use std::sync::Arc;
use tracing::{info, warn};

use rapid_common::services::{
    BoxFuture, BoxedError, ChannelFactory, DeliveryOutcome, EmailDeliveryService, PushDeliveryService,
    PushFanout, PushMessage, SmsDeliveryService,
};
use rapid_common::{is_email_enabled, is_push_enabled, is_sms_enabled};
use rapid_config::AppConfig;
use rapid_email::{client::EmailClient, service::HttpEmailService};
use rapid_push::{client::FcmClient, service::FcmPushService};
use rapid_twilio::{service::TwilioSmsService, sms::TwilioSmsClient};

struct BoxedPushService {
    inner: FcmPushService,
}

impl PushDeliveryService for BoxedPushService {
    type Error = BoxedError;

    fn send_to_tokens(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> BoxFuture<'_, PushFanout, Self::Error> {
        let tokens = tokens.to_vec();
        let message = message.clone();
        Box::pin(async move {
            self.inner
                .send_to_tokens(&tokens, &message)
                .await
                .map_err(|e| BoxedError(Box::new(e)))
        })
    }
}

struct BoxedEmailService {
    inner: HttpEmailService,
}

impl EmailDeliveryService for BoxedEmailService {
    type Error = BoxedError;

    fn send_email(
        &self,
        to: &str,
        recipient_name: Option<&str>,
        subject: &str,
        body: &str,
        action_url: Option<&str>,
    ) -> BoxFuture<'_, DeliveryOutcome, Self::Error> {
        let to = to.to_string();
        let recipient_name = recipient_name.map(str::to_string);
        let subject = subject.to_string();
        let body = body.to_string();
        let action_url = action_url.map(str::to_string);
        Box::pin(async move {
            self.inner
                .send_email(
                    &to,
                    recipient_name.as_deref(),
                    &subject,
                    &body,
                    action_url.as_deref(),
                )
                .await
                .map_err(|e| BoxedError(Box::new(e)))
        })
    }
}

struct BoxedSmsService {
    inner: TwilioSmsService,
}

impl SmsDeliveryService for BoxedSmsService {
    type Error = BoxedError;

    fn send_sms(&self, to: &str, body: &str) -> BoxFuture<'_, DeliveryOutcome, Self::Error> {
        let to = to.to_string();
        let body = body.to_string();
        Box::pin(async move {
            self.inner
                .send_sms(&to, &body)
                .await
                .map_err(|e| BoxedError(Box::new(e)))
        })
    }
}

/// Channel factory backed by the configured providers.
pub struct RapidChannelFactory {
    push_service: Option<Arc<dyn PushDeliveryService<Error = BoxedError>>>,
    email_service: Option<Arc<dyn EmailDeliveryService<Error = BoxedError>>>,
    sms_service: Option<Arc<dyn SmsDeliveryService<Error = BoxedError>>>,
}

impl RapidChannelFactory {
    /// Create a new channel factory from the application configuration.
    ///
    /// A misconfigured channel is logged and disabled, never fatal; the
    /// remaining channels still come up.
    pub fn new(config: Arc<AppConfig>) -> Self {
        let push_service = if is_push_enabled(&config) {
            config.fcm.clone().map(|fcm_config| {
                info!("Initializing FCM push channel");
                Arc::new(BoxedPushService {
                    inner: FcmPushService::new(FcmClient::new(fcm_config)),
                }) as Arc<dyn PushDeliveryService<Error = BoxedError>>
            })
        } else {
            info!("Push channel disabled");
            None
        };

        let email_service = if is_email_enabled(&config) {
            config
                .email
                .clone()
                .and_then(|email_config| match EmailClient::new(email_config) {
                    Ok(client) => {
                        info!("Initializing email channel");
                        Some(Arc::new(BoxedEmailService {
                            inner: HttpEmailService::new(client),
                        }) as Arc<dyn EmailDeliveryService<Error = BoxedError>>)
                    }
                    Err(err) => {
                        warn!(error = %err, "Email channel configured but unusable, disabling");
                        None
                    }
                })
        } else {
            info!("Email channel disabled");
            None
        };

        let sms_service = if is_sms_enabled(&config) {
            config
                .sms
                .clone()
                .and_then(|sms_config| match TwilioSmsClient::new(sms_config) {
                    Ok(client) => {
                        info!("Initializing Twilio SMS channel");
                        Some(Arc::new(BoxedSmsService {
                            inner: TwilioSmsService::new(client),
                        }) as Arc<dyn SmsDeliveryService<Error = BoxedError>>)
                    }
                    Err(err) => {
                        warn!(error = %err, "SMS channel configured but unusable, disabling");
                        None
                    }
                })
        } else {
            info!("SMS channel disabled");
            None
        };

        Self {
            push_service,
            email_service,
            sms_service,
        }
    }
}

impl ChannelFactory for RapidChannelFactory {
    fn push_service(&self) -> Option<Arc<dyn PushDeliveryService<Error = BoxedError>>> {
        self.push_service.clone()
    }

    fn email_service(&self) -> Option<Arc<dyn EmailDeliveryService<Error = BoxedError>>> {
        self.email_service.clone()
    }

    fn sms_service(&self) -> Option<Arc<dyn SmsDeliveryService<Error = BoxedError>>> {
        self.sms_service.clone()
    }
}
