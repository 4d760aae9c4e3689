//! Authentication for Firebase Cloud Messaging.
//!
//! Reads a service account key file and exchanges it for an OAuth2 access
//! token scoped to the FCM messaging API.

use rapid_config::FcmConfig;
use std::{error::Error, path::Path};
use yup_oauth2::{read_service_account_key, ServiceAccountAuthenticator};

/// Obtain an OAuth2 access token for Firebase Cloud Messaging.
///
/// # Arguments
///
/// * `config` - FCM configuration containing the path to the service account key file
///
/// # Errors
///
/// This function will return an error if:
/// * The key_path is missing from the FcmConfig
/// * The service account key file cannot be read
/// * Authentication with Google's OAuth2 service fails
/// * No token is returned from the authentication service
pub async fn get_fcm_auth_token(
    config: &FcmConfig,
) -> Result<String, Box<dyn Error + Send + Sync>> {
    let key_path = config
        .key_path
        .as_deref()
        .ok_or("Missing key_path in FcmConfig")?;

    let sa_key = read_service_account_key(Path::new(key_path)).await?;

    let auth = ServiceAccountAuthenticator::builder(sa_key).build().await?;

    // FCM requires the "https://www.googleapis.com/auth/firebase.messaging" scope
    let auth_token = auth
        .token(&["https://www.googleapis.com/auth/firebase.messaging"])
        .await?;
    let token = match auth_token.token() {
        Some(token) => token,
        None => {
            return Err("No token available".into());
        }
    };

    Ok(token.to_string())
}
