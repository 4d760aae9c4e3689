// --- File: crates/rapid_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8086,
        }
    }
}

// --- Document Store Config ---
// Selects the document store backend. "memory" keeps everything in-process
// (tests, local dev); "sqlite" persists documents as JSON rows.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    pub backend: String, // "memory" or "sqlite"
    pub url: Option<String>, // e.g., sqlite://rapidnotify.db, loaded via APP_STORE__URL
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            url: None,
        }
    }
}

// --- Firebase Cloud Messaging Config ---
// Holds non-secret FCM config. The service account key lives on disk at key_path.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FcmConfig {
    pub project_id: Option<String>,
    pub key_path: Option<String>,
    /// Override for the FCM endpoint, used by tests to point at a local mock.
    pub endpoint: Option<String>,
}

// --- Email Delivery Config ---
// HTTP-API mail provider. API key loaded directly from env var: EMAIL_API_KEY.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmailConfig {
    pub api_url: String,    // Mandatory
    pub from_address: String, // Mandatory
    pub from_name: Option<String>,
}

// --- Twilio SMS Config ---
// Holds non-secret Twilio config. Auth token loaded directly from env var:
// TWILIO_AUTH_TOKEN.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SmsConfig {
    pub account_sid: String, // Loaded via APP_SMS__ACCOUNT_SID or TWILIO_ACCOUNT_SID
    pub from_number: String,
    /// Override for the Twilio endpoint, used by tests to point at a local mock.
    pub endpoint: Option<String>,
}

// --- Unified App Configuration ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    // Server config is mandatory
    #[serde(default)]
    pub server: ServerConfig,

    // --- Runtime Flags (optional in config file, default to false) ---
    #[serde(default)]
    pub use_push: bool,
    #[serde(default)]
    pub use_email: bool,
    #[serde(default)]
    pub use_sms: bool,

    // --- Optional Feature Configurations ---
    #[serde(default)]
    pub store: Option<StoreConfig>,
    #[serde(default)]
    pub fcm: Option<FcmConfig>,
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub sms: Option<SmsConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            use_push: false,
            use_email: false,
            use_sms: false,
            store: Some(StoreConfig::default()),
            fcm: None,
            email: None,
            sms: None,
        }
    }
}
