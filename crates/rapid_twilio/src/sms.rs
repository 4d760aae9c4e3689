// --- File: crates/rapid_twilio/src/sms.rs ---
//! Twilio SMS client.
//!
//! SMS is the urgent-only channel: the dispatcher invokes it exclusively
//! for envelopes flagged urgent, so volume stays low and a failure here is
//! never load-bearing. The auth token is read from the `TWILIO_AUTH_TOKEN`
//! env var, never from config files.

use rapid_config::SmsConfig;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

/// Twilio-specific error types.
#[derive(Error, Debug)]
pub enum TwilioError {
    /// Error occurred during a Twilio API request
    #[error("Twilio API request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Error returned by the Twilio API
    #[error("Twilio API returned an error: {message} (Status: {status_code})")]
    ApiError { status_code: u16, message: String },

    /// Missing or incomplete Twilio configuration
    #[error("Twilio configuration missing or incomplete")]
    ConfigError,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
    status: Option<String>,
}

/// Client for the Twilio Messages API.
pub struct TwilioSmsClient {
    client: Client,
    config: SmsConfig,
    auth_token: String,
}

impl TwilioSmsClient {
    /// Create a new SMS client.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the `TWILIO_AUTH_TOKEN` env var is not set.
    pub fn new(config: SmsConfig) -> Result<Self, TwilioError> {
        rapid_config::ensure_dotenv_loaded();
        let auth_token = std::env::var("TWILIO_AUTH_TOKEN").map_err(|_| TwilioError::ConfigError)?;
        Ok(Self::with_auth_token(config, auth_token))
    }

    /// Create a client with an explicit auth token (tests).
    pub fn with_auth_token(config: SmsConfig, auth_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            config,
            auth_token: auth_token.into(),
        }
    }

    fn messages_url(&self) -> String {
        match self.config.endpoint.as_deref() {
            Some(endpoint) => endpoint.to_string(),
            None => format!(
                "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
                self.config.account_sid
            ),
        }
    }

    /// Send an SMS.
    ///
    /// # Returns
    ///
    /// The Twilio message SID and reported status.
    pub async fn send(&self, to: &str, body: &str) -> Result<(String, String), TwilioError> {
        let url = self.messages_url();

        let params = [
            ("To", to),
            ("From", self.config.from_number.as_str()),
            ("Body", body),
        ];

        info!("Sending SMS to {}", to);
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            // Bubble up the Twilio JSON error so failures can be debugged
            error!("Twilio returned {}: {}", status, body);
            return Err(TwilioError::ApiError {
                status_code: status.as_u16(),
                message: body,
            });
        }

        let message: MessageResponse = resp.json().await?;
        info!("SMS queued for {}: {}", to, message.sid);
        Ok((
            message.sid,
            message.status.unwrap_or_else(|| "queued".to_string()),
        ))
    }
}
