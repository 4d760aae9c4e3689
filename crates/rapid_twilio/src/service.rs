//! SMS delivery service implementation.

use crate::sms::{TwilioError, TwilioSmsClient};
use rapid_common::services::{BoxFuture, DeliveryOutcome, SmsDeliveryService};

/// SMS delivery backed by Twilio.
pub struct TwilioSmsService {
    client: TwilioSmsClient,
}

impl TwilioSmsService {
    /// Create a new SMS service around a configured client.
    pub fn new(client: TwilioSmsClient) -> Self {
        Self { client }
    }
}

impl SmsDeliveryService for TwilioSmsService {
    type Error = TwilioError;

    fn send_sms(&self, to: &str, body: &str) -> BoxFuture<'_, DeliveryOutcome, Self::Error> {
        let to = to.to_string();
        let body = body.to_string();
        Box::pin(async move {
            let (sid, status) = self.client.send(&to, &body).await?;
            Ok(DeliveryOutcome { id: sid, status })
        })
    }
}
