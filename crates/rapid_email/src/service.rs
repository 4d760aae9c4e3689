//! Email delivery service implementation.

use crate::client::{EmailClient, EmailError};
use rapid_common::services::{BoxFuture, DeliveryOutcome, EmailDeliveryService};

/// Email delivery backed by the HTTP mail provider.
pub struct HttpEmailService {
    client: EmailClient,
}

impl HttpEmailService {
    /// Create a new email service around a configured client.
    pub fn new(client: EmailClient) -> Self {
        Self { client }
    }
}

impl EmailDeliveryService for HttpEmailService {
    type Error = EmailError;

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
            let id = self
                .client
                .send(
                    &to,
                    recipient_name.as_deref(),
                    &subject,
                    &body,
                    action_url.as_deref(),
                )
                .await?;
            Ok(DeliveryOutcome {
                id,
                status: "accepted".to_string(),
            })
        })
    }
}
