//! Feature flag handling for the RapidNotify application.
//!
//! Delivery channels are gated two ways:
//!
//! 1. Compile-time feature flags using `#[cfg(feature = "...")]`
//! 2. Runtime flags in the configuration (`use_push`, `use_email`, `use_sms`)
//!
//! A channel is only active when its runtime flag is set AND its
//! configuration section is present.

use rapid_config::AppConfig;
use std::sync::Arc;

/// Check if a feature is enabled at runtime based on configuration.
///
/// # Arguments
///
/// * `config` - The application configuration
/// * `use_feature` - The configuration flag that enables the feature
/// * `feature_config` - The configuration section for the feature
///
/// # Returns
///
/// `true` if the feature is enabled, `false` otherwise
pub fn is_feature_enabled<T>(
    _config: &Arc<AppConfig>,
    use_feature: bool,
    feature_config: Option<&T>,
) -> bool {
    use_feature && feature_config.is_some()
}

/// Check if the push channel is enabled at runtime.
pub fn is_push_enabled(config: &Arc<AppConfig>) -> bool {
    is_feature_enabled(config, config.use_push, config.fcm.as_ref())
}

/// Check if the email channel is enabled at runtime.
pub fn is_email_enabled(config: &Arc<AppConfig>) -> bool {
    is_feature_enabled(config, config.use_email, config.email.as_ref())
}

/// Check if the SMS channel is enabled at runtime.
pub fn is_sms_enabled(config: &Arc<AppConfig>) -> bool {
    is_feature_enabled(config, config.use_sms, config.sms.as_ref())
}
