// --- File: crates/rapid_common/src/services.rs ---
//! Service abstractions for notification delivery channels.
//!
//! This module provides trait definitions for the external delivery services
//! used by the dispatcher. These traits allow for dependency injection and
//! easier testing by decoupling the notification core from specific
//! implementations (FCM, a mail provider, Twilio).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// A wrapper error type that implements std::error::Error for Box<dyn std::error::Error + Send + Sync>
#[derive(Debug)]
pub struct BoxedError(pub Box<dyn StdError + Send + Sync>);

impl fmt::Display for BoxedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for BoxedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<Box<dyn StdError + Send + Sync>> for BoxedError {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        BoxedError(err)
    }
}

/// The push payload handed to a [`PushDeliveryService`].
///
/// This is the channel-specific projection of a notification envelope:
/// display fields plus the string-to-string data map that push transports
/// carry for deep-linking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    /// The title of the notification
    pub title: String,
    /// The body text of the notification
    pub body: String,
    /// Optional icon URL displayed by the receiving device
    pub icon: Option<String>,
    /// Custom key-value data delivered alongside the notification
    pub data: HashMap<String, String>,
}

/// Result of a push fan-out across a set of device tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushFanout {
    /// Number of tokens the transport accepted the message for.
    pub delivered: usize,
    /// Number of tokens the transport rejected (stale or invalid tokens).
    /// Per-token failures are non-fatal; orphaned tokens are tolerated.
    pub failed: usize,
    /// Transport-assigned message ids for the successful sends.
    pub message_ids: Vec<String>,
}

/// Represents the result of a single-recipient delivery (email, SMS).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    /// Provider-assigned id of the delivery.
    pub id: String,
    /// Provider-reported status of the delivery.
    pub status: String,
}

/// A trait for push delivery operations.
///
/// Implementations send a [`PushMessage`] to an explicit set of device
/// tokens. Token lookup is the caller's concern; the service only talks to
/// the push transport.
pub trait PushDeliveryService: Send + Sync {
    /// Error type returned by push delivery operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send a message to every token in `tokens`, tolerating per-token
    /// failures. The returned fan-out reports how many sends succeeded.
    fn send_to_tokens(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> BoxFuture<'_, PushFanout, Self::Error>;
}

/// A trait for email delivery operations.
pub trait EmailDeliveryService: Send + Sync {
    /// Error type returned by email delivery operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send an email notification.
    fn send_email(
        &self,
        to: &str,
        recipient_name: Option<&str>,
        subject: &str,
        body: &str,
        action_url: Option<&str>,
    ) -> BoxFuture<'_, DeliveryOutcome, Self::Error>;
}

/// A trait for SMS delivery operations.
pub trait SmsDeliveryService: Send + Sync {
    /// Error type returned by SMS delivery operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send an SMS notification.
    fn send_sms(&self, to: &str, body: &str) -> BoxFuture<'_, DeliveryOutcome, Self::Error>;
}

/// A factory for the delivery channel services.
///
/// This trait provides the dispatcher with access to whichever channels the
/// deployment has configured. A `None` return means the channel is disabled
/// and must be skipped, not treated as a failure.
pub trait ChannelFactory: Send + Sync {
    /// Get the push delivery service, if push is enabled.
    fn push_service(&self) -> Option<Arc<dyn PushDeliveryService<Error = BoxedError>>>;

    /// Get the email delivery service, if email is enabled.
    fn email_service(&self) -> Option<Arc<dyn EmailDeliveryService<Error = BoxedError>>>;

    /// Get the SMS delivery service, if SMS is enabled.
    fn sms_service(&self) -> Option<Arc<dyn SmsDeliveryService<Error = BoxedError>>>;
}
