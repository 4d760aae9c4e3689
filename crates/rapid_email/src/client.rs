//! HTTP-API transactional email client.
//!
//! Email is the universal fallback channel: it is attempted on every
//! dispatch regardless of push/SMS outcomes, so this client stays
//! deliberately small. The provider is any JSON-over-HTTP mail API; the
//! API key is read from the `EMAIL_API_KEY` env var, never from config
//! files.

use rapid_config::EmailConfig;
use reqwest::{header, Client};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when sending email.
#[derive(Error, Debug)]
pub enum EmailError {
    /// Error during HTTP request to the mail provider
    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Missing required configuration
    #[error("Missing configuration: {0}")]
    ConfigError(String),

    /// Error returned by the mail provider
    #[error("Mail provider error {status}: {message}")]
    ApiError { status: u16, message: String },
}

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: Party<'a>,
    to: Party<'a>,
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    action_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Party<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Client for the transactional mail provider.
pub struct EmailClient {
    client: Client,
    config: EmailConfig,
    api_key: String,
}

impl EmailClient {
    /// Create a new email client.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the `EMAIL_API_KEY` env var is not set.
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        rapid_config::ensure_dotenv_loaded();
        let api_key = std::env::var("EMAIL_API_KEY")
            .map_err(|_| EmailError::ConfigError("EMAIL_API_KEY is not set".to_string()))?;
        Ok(Self::with_api_key(config, api_key))
    }

    /// Create a client with an explicit API key (tests).
    pub fn with_api_key(config: EmailConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            config,
            api_key: api_key.into(),
        }
    }

    /// Send a plain-text notification email.
    ///
    /// # Returns
    ///
    /// The provider-assigned message id.
    pub async fn send(
        &self,
        to: &str,
        recipient_name: Option<&str>,
        subject: &str,
        body: &str,
        action_url: Option<&str>,
    ) -> Result<String, EmailError> {
        let request = EmailRequest {
            from: Party {
                email: &self.config.from_address,
                name: self.config.from_name.as_deref(),
            },
            to: Party {
                email: to,
                name: recipient_name,
            },
            subject,
            text: body,
            action_url,
        };

        debug!("Sending notification email to {}", to);
        let response = self
            .client
            .post(&self.config.api_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmailError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: serde_json::Value = response.json().await?;
        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        info!("Notification email accepted for {}: {}", to, id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_url: String) -> EmailConfig {
        EmailConfig {
            api_url,
            from_address: "noreply@rapidworks.example".to_string(),
            from_name: Some("RapidWorks".to_string()),
        }
    }

    #[tokio::test]
    async fn send_posts_expected_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer key-1"))
            .and(body_partial_json(serde_json::json!({
                "to": {"email": "customer@example.com"},
                "subject": "New message",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "mail-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = EmailClient::with_api_key(test_config(server.uri()), "key-1");
        let id = client
            .send(
                "customer@example.com",
                Some("Customer"),
                "New message",
                "You have a new message.",
                Some("https://app.rapidworks.example/dashboard"),
            )
            .await
            .unwrap();
        assert_eq!(id, "mail-1");
    }

    #[tokio::test]
    async fn provider_rejection_includes_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid recipient"))
            .mount(&server)
            .await;

        let client = EmailClient::with_api_key(test_config(server.uri()), "key-1");
        let err = client
            .send("not-an-address", None, "s", "b", None)
            .await
            .unwrap_err();
        match err {
            EmailError::ApiError { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "invalid recipient");
            }
            other => panic!("expected ApiError, got {other}"),
        }
    }
}
