// --- File: crates/rapid_push/src/service.rs ---
//! Push delivery service implementation over the FCM client.
//!
//! Fans a [`PushMessage`] out to every registered token for an owner.
//! Per-token failures are logged and counted but never abort the fan-out:
//! tokens go stale whenever a browser re-installs its service worker, and
//! the platform is the ultimate authority on token validity.

use crate::client::{FcmClient, FcmError, FcmMessage, Message, Notification};
use rapid_common::services::{BoxFuture, PushDeliveryService, PushFanout, PushMessage};
use tracing::{debug, warn};

/// Push delivery backed by Firebase Cloud Messaging.
pub struct FcmPushService {
    client: FcmClient,
}

impl FcmPushService {
    /// Create a new push service around an FCM client.
    pub fn new(client: FcmClient) -> Self {
        Self { client }
    }
}

impl PushDeliveryService for FcmPushService {
    type Error = FcmError;

    fn send_to_tokens(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> BoxFuture<'_, PushFanout, Self::Error> {
        let tokens = tokens.to_vec();
        let message = message.clone();
        Box::pin(async move {
            let mut fanout = PushFanout {
                delivered: 0,
                failed: 0,
                message_ids: Vec::new(),
            };

            for token in &tokens {
                let fcm_message = FcmMessage {
                    message: Message {
                        token: token.clone(),
                        notification: Some(Notification {
                            title: message.title.clone(),
                            body: message.body.clone(),
                            image: message.icon.clone(),
                        }),
                        data: Some(message.data.clone()),
                    },
                };

                match self.client.send_message(fcm_message).await {
                    Ok(message_id) => {
                        debug!("Push delivered: {}", message_id);
                        fanout.delivered += 1;
                        fanout.message_ids.push(message_id);
                    }
                    Err(err) => {
                        // Orphaned tokens are expected; dispatch treats
                        // per-token send failures as non-fatal.
                        warn!("Push send failed for one token: {}", err);
                        fanout.failed += 1;
                    }
                }
            }

            Ok(fanout)
        })
    }
}
