// --- File: crates/rapid_notify/src/capability.rs ---
//! Runtime capability detection.
//!
//! Classifies the client runtime (reported by the browser session) as
//! desktop, Android, iOS, or other, and decides whether push notifications
//! are safely usable there. Pure classification: no side effects, no I/O.
//! Every downstream permission decision hangs off this, so the policy here
//! must stay exactly as specified:
//!
//! - no Notification API -> unsupported, nothing further is possible
//! - in-app browser -> unsupported even when the permission API exists
//!   (these environments break service-worker registration)
//! - iOS outside an installed PWA -> push is only potential; the caller
//!   must be told to install instead of being allowed to prompt
//! - mobile browser (Android or other) outside a PWA -> usable, install
//!   recommended
//! - desktop, or any standalone/PWA context -> fully usable

use serde::{Deserialize, Serialize};

/// User-agent fragments identifying embedded in-app browsers (social apps).
const IN_APP_BROWSER_SIGNATURES: &[&str] = &[
    "FBAN",
    "FBAV",
    "FB_IAB",
    "Instagram",
    "Line/",
    "MicroMessenger",
    "Snapchat",
    "TikTok",
    "Twitter",
    "LinkedInApp",
    "GSA/",
];

/// The platform family a user agent resolves to.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Desktop,
    Android,
    Ios,
    Other,
}

/// The push-support level of a runtime.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "camelCase")]
pub enum PushSupport {
    /// Push cannot work here at all.
    Unsupported { reason: String },
    /// Push only works after the app is installed to the home screen.
    RequiresPwa,
    /// Push works, but installing the PWA is recommended for reliability.
    UsableInstallRecommended,
    /// Push is fully usable; permission can be requested directly.
    Usable,
}

impl PushSupport {
    /// Whether a permission request may be attempted in this runtime.
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            PushSupport::Usable | PushSupport::UsableInstallRecommended
        )
    }

    /// Whether installing the PWA is mandatory before push can work.
    pub fn requires_pwa(&self) -> bool {
        matches!(self, PushSupport::RequiresPwa)
    }
}

/// The runtime facts a client session reports about itself.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRuntime {
    /// The browser's user-agent string.
    pub user_agent: String,

    /// True when running in standalone/installed (PWA) display mode.
    #[serde(default)]
    pub standalone: bool,

    /// Whether the global Notification API exists.
    #[serde(default)]
    pub notification_api: bool,

    /// Whether the service-worker API exists.
    #[serde(default)]
    pub service_worker_api: bool,
}

/// The classification result.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub platform: PlatformFamily,
    #[serde(rename = "isStandalonePWA")]
    pub is_standalone_pwa: bool,
    pub is_in_app_browser: bool,
    pub notification_api_available: bool,
    pub support: PushSupport,
}

fn platform_family(user_agent: &str) -> PlatformFamily {
    if user_agent.contains("iPhone") || user_agent.contains("iPad") || user_agent.contains("iPod")
    {
        PlatformFamily::Ios
    } else if user_agent.contains("Android") {
        PlatformFamily::Android
    } else if user_agent.contains("Mobile") {
        PlatformFamily::Other
    } else {
        PlatformFamily::Desktop
    }
}

fn is_in_app_browser(user_agent: &str) -> bool {
    IN_APP_BROWSER_SIGNATURES
        .iter()
        .any(|signature| user_agent.contains(signature))
}

/// Classify a client runtime.
pub fn classify_environment(runtime: &ClientRuntime) -> Capability {
    let platform = platform_family(&runtime.user_agent);
    let in_app = is_in_app_browser(&runtime.user_agent);

    let support = if !runtime.notification_api {
        PushSupport::Unsupported {
            reason: "notification API is not available in this browser".to_string(),
        }
    } else if in_app {
        PushSupport::Unsupported {
            reason: "in-app browsers cannot register service workers".to_string(),
        }
    } else if platform == PlatformFamily::Ios && !runtime.standalone {
        PushSupport::RequiresPwa
    } else if matches!(platform, PlatformFamily::Android | PlatformFamily::Other)
        && !runtime.standalone
    {
        // Any mobile browser outside a PWA: usable, but suggest installing.
        PushSupport::UsableInstallRecommended
    } else {
        PushSupport::Usable
    };

    Capability {
        platform,
        is_standalone_pwa: runtime.standalone,
        is_in_app_browser: in_app,
        notification_api_available: runtime.notification_api,
        support,
    }
}
