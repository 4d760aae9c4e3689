// --- File: crates/rapid_push/src/client.rs ---
//! Firebase Cloud Messaging client.
//!
//! This module provides a client for the FCM HTTP v1 API. The main component
//! is the [`FcmClient`] struct, which handles authentication and
//! communication with the send endpoint, plus the data structures for FCM
//! messages and responses.

use crate::auth::get_fcm_auth_token;
use rapid_config::FcmConfig;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when interacting with the FCM API.
#[derive(Error, Debug)]
pub enum FcmError {
    /// Error during authentication with Firebase
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error during HTTP request to the FCM API
    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Missing required configuration
    #[error("Missing configuration: {0}")]
    ConfigError(String),

    /// Error returned by the FCM API
    #[error("FCM API error: {0}")]
    ApiError(String),
}

/// A message to be sent via Firebase Cloud Messaging.
///
/// Top-level wrapper around [`Message`] per the FCM HTTP v1 API format.
#[derive(Debug, Serialize)]
pub struct FcmMessage {
    /// The message payload
    pub message: Message,
}

/// The message payload for Firebase Cloud Messaging.
#[derive(Debug, Serialize)]
pub struct Message {
    /// Registration token identifying the target device.
    pub token: String,

    /// The notification to be displayed on the device. If not provided, the
    /// message is data-only.
    pub notification: Option<Notification>,

    /// Custom key-value data available to the receiving app (deep-link urls,
    /// entity ids).
    pub data: Option<std::collections::HashMap<String, String>>,
}

/// The notification displayed on the device.
#[derive(Debug, Serialize)]
pub struct Notification {
    /// The title of the notification
    pub title: String,

    /// The body text of the notification
    pub body: String,

    /// Icon image URL, where the platform supports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Response from the FCM API after a successful send.
#[derive(Debug, Deserialize)]
pub struct FcmResponse {
    /// Message id in the format "projects/{project_id}/messages/{message_id}"
    pub name: String,
}

/// How the client obtains its bearer token.
enum TokenProvider {
    /// Exchange the configured service account key on each send.
    ServiceAccount,
    /// A fixed token, used by tests pointing at a mock endpoint.
    Static(String),
}

/// Client for the Firebase Cloud Messaging HTTP v1 API.
pub struct FcmClient {
    client: Client,
    config: FcmConfig,
    token_provider: TokenProvider,
}

impl FcmClient {
    /// Create a new FCM client authenticating with the configured service
    /// account key.
    pub fn new(config: FcmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            token_provider: TokenProvider::ServiceAccount,
        }
    }

    /// Create a client with a fixed bearer token. Only useful against a
    /// non-production endpoint.
    pub fn with_static_token(config: FcmConfig, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            config,
            token_provider: TokenProvider::Static(token.into()),
        }
    }

    fn send_url(&self) -> Result<String, FcmError> {
        if let Some(endpoint) = self.config.endpoint.as_deref() {
            return Ok(endpoint.to_string());
        }
        let project_id = self
            .config
            .project_id
            .as_deref()
            .ok_or_else(|| FcmError::ConfigError("Missing project_id in FcmConfig".to_string()))?;
        Ok(format!(
            "https://fcm.googleapis.com/v1/projects/{}/messages:send",
            project_id
        ))
    }

    async fn bearer_token(&self) -> Result<String, FcmError> {
        match &self.token_provider {
            TokenProvider::Static(token) => Ok(token.clone()),
            TokenProvider::ServiceAccount => get_fcm_auth_token(&self.config)
                .await
                .map_err(|e| FcmError::AuthError(e.to_string())),
        }
    }

    /// Send a single push message.
    ///
    /// # Returns
    ///
    /// On success, the FCM-assigned message id.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete, authentication
    /// fails, the HTTP request fails, or the API rejects the message (a
    /// stale or unregistered token surfaces here as `ApiError`).
    pub async fn send_message(&self, message: FcmMessage) -> Result<String, FcmError> {
        let url = self.send_url()?;
        let token = self.bearer_token().await?;

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .json(&message)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(FcmError::ApiError(error_text));
        }

        let fcm_response: FcmResponse = response.json().await?;
        Ok(fcm_response.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: String) -> FcmConfig {
        FcmConfig {
            project_id: Some("rapidworks-test".to_string()),
            key_path: None,
            endpoint: Some(endpoint),
        }
    }

    #[tokio::test]
    async fn send_message_posts_v1_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(serde_json::json!({
                "message": {"token": "device-1", "notification": {"title": "Hi", "body": "There"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "projects/rapidworks-test/messages/msg-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = FcmClient::with_static_token(test_config(server.uri()), "test-token");
        let message_id = client
            .send_message(FcmMessage {
                message: Message {
                    token: "device-1".to_string(),
                    notification: Some(Notification {
                        title: "Hi".to_string(),
                        body: "There".to_string(),
                        image: None,
                    }),
                    data: None,
                },
            })
            .await
            .unwrap();
        assert_eq!(message_id, "projects/rapidworks-test/messages/msg-1");
    }

    #[tokio::test]
    async fn api_rejection_surfaces_as_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("UNREGISTERED"))
            .mount(&server)
            .await;

        let client = FcmClient::with_static_token(test_config(server.uri()), "test-token");
        let err = client
            .send_message(FcmMessage {
                message: Message {
                    token: "stale-token".to_string(),
                    notification: None,
                    data: None,
                },
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FcmError::ApiError(_)));
    }

    #[tokio::test]
    async fn missing_project_id_is_a_config_error() {
        let client = FcmClient::new(FcmConfig {
            project_id: None,
            key_path: None,
            endpoint: None,
        });
        let err = client
            .send_message(FcmMessage {
                message: Message {
                    token: "t".to_string(),
                    notification: None,
                    data: None,
                },
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FcmError::ConfigError(_)));
    }
}
