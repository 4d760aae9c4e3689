//! Notification-stack diagnostics.
//!
//! A pure, read-only walk across every layer push delivery depends on:
//! browser support, service worker, permission, token, and store
//! reachability. Nothing is mutated and nothing is prompted; the report is
//! rendered on a support page so a user can see exactly which layer broke.

use serde::{Deserialize, Serialize};
use tracing::debug;

use rapid_store::DocumentStore;

use crate::capability::{classify_environment, ClientRuntime};
use crate::permission::{PermissionState, PushPlatform};

/// One layer's probe outcome.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub ok: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ProbeResult {
    fn ok(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: Some(detail.into()),
        }
    }

    fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

/// The full diagnostics report.
///
/// `overall` is the conjunction of every probe plus a granted permission;
/// any single failing layer makes the whole report fail.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub browser_support: ProbeResult,
    pub service_worker: ProbeResult,
    /// The raw permission state string: granted, denied, or default.
    pub permission: String,
    pub token: ProbeResult,
    pub database: ProbeResult,
    pub overall: bool,
}

/// Run the diagnostics walk.
///
/// Read-only by contract: permission is queried, never requested, and the
/// token probe uses the existing registration without creating one.
pub async fn run_diagnostics(
    platform: &dyn PushPlatform,
    runtime: &ClientRuntime,
    store: &dyn DocumentStore,
) -> DiagnosticsReport {
    let capability = classify_environment(runtime);
    let browser_support = if capability.support.is_usable() {
        ProbeResult::ok(format!("{:?} browser is supported", capability.platform))
    } else {
        ProbeResult::failed(match &capability.support {
            crate::capability::PushSupport::Unsupported { reason } => reason.clone(),
            crate::capability::PushSupport::RequiresPwa => {
                "push requires installing the app to the home screen".to_string()
            }
            _ => "unsupported".to_string(),
        })
    };

    let service_worker = if runtime.service_worker_api {
        match platform.has_messaging_worker().await {
            Ok(true) => ProbeResult::ok("messaging service worker registered"),
            Ok(false) => ProbeResult::failed("messaging service worker is not registered"),
            Err(err) => ProbeResult::failed(err.to_string()),
        }
    } else {
        ProbeResult::failed("service worker API is not available")
    };

    let permission = match platform.permission_state().await {
        Ok(PermissionState::Granted) => "granted",
        Ok(PermissionState::Denied) => "denied",
        Ok(PermissionState::Default) => "default",
        Err(_) => "unavailable",
    }
    .to_string();

    let token = if permission == "granted" {
        match platform.fetch_token().await {
            Ok(token) => {
                // Only a prefix; the full token is a credential.
                let prefix: String = token.chars().take(12).collect();
                ProbeResult::ok(format!("token present ({prefix}...)"))
            }
            Err(err) => ProbeResult::failed(err.to_string()),
        }
    } else {
        ProbeResult::failed("no token without granted permission")
    };

    let database = match store.get("diagnostics", "probe").await {
        Ok(_) => ProbeResult::ok("store reachable"),
        Err(err) => ProbeResult::failed(err.to_string()),
    };

    let overall = browser_support.ok
        && service_worker.ok
        && permission == "granted"
        && token.ok
        && database.ok;

    debug!(overall, permission = %permission, "diagnostics walk complete");

    DiagnosticsReport {
        browser_support,
        service_worker,
        permission,
        token,
        database,
        overall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapid_common::services::BoxFuture;
    use rapid_store::MemoryStore;

    use crate::models::DeviceMetadata;
    use crate::permission::PlatformError;

    const DESKTOP_CHROME: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
        Chrome/120.0.0.0 Safari/537.36";

    struct FixedPlatform {
        permission: PermissionState,
        token: Result<String, String>,
    }

    impl PushPlatform for FixedPlatform {
        fn permission_state(&self) -> BoxFuture<'_, PermissionState, PlatformError> {
            let state = self.permission;
            Box::pin(async move { Ok(state) })
        }
        fn request_permission(&self) -> BoxFuture<'_, PermissionState, PlatformError> {
            // Diagnostics must never prompt.
            Box::pin(async { Err(PlatformError::Permission("prompted during read".into())) })
        }
        fn fetch_token(&self) -> BoxFuture<'_, String, PlatformError> {
            let result = self.token.clone();
            Box::pin(async move { result.map_err(PlatformError::Token) })
        }
        fn register_service_worker(&self) -> BoxFuture<'_, (), PlatformError> {
            // Diagnostics must never mutate worker state.
            Box::pin(async { Err(PlatformError::ServiceWorker("registered during read".into())) })
        }
        fn has_messaging_worker(&self) -> BoxFuture<'_, bool, PlatformError> {
            Box::pin(async { Ok(true) })
        }
        fn device_metadata(&self) -> DeviceMetadata {
            DeviceMetadata::default()
        }
    }

    fn runtime() -> ClientRuntime {
        ClientRuntime {
            user_agent: DESKTOP_CHROME.to_string(),
            standalone: false,
            notification_api: true,
            service_worker_api: true,
        }
    }

    #[tokio::test]
    async fn all_layers_healthy_means_overall_ok() {
        let platform = FixedPlatform {
            permission: PermissionState::Granted,
            token: Ok("tok-abcdef123456789".to_string()),
        };
        let store = MemoryStore::new();

        let report = run_diagnostics(&platform, &runtime(), &store).await;

        assert!(report.overall);
        assert_eq!(report.permission, "granted");
        assert!(report.token.ok);
        // The token itself must not be echoed in full.
        assert!(!report.token.detail.as_deref().unwrap().contains("tok-abcdef123456789"));
    }

    #[tokio::test]
    async fn any_failing_layer_fails_overall() {
        let platform = FixedPlatform {
            permission: PermissionState::Default,
            token: Ok("tok".to_string()),
        };
        let store = MemoryStore::new();

        let report = run_diagnostics(&platform, &runtime(), &store).await;

        assert!(!report.overall);
        assert_eq!(report.permission, "default");
        assert!(!report.token.ok);
        // The healthy layers still report ok individually.
        assert!(report.browser_support.ok);
        assert!(report.database.ok);
    }

    #[tokio::test]
    async fn granted_permission_with_failing_token_pinpoints_the_token_layer() {
        let platform = FixedPlatform {
            permission: PermissionState::Granted,
            token: Err("transport unavailable".to_string()),
        };
        let store = MemoryStore::new();

        let report = run_diagnostics(&platform, &runtime(), &store).await;

        assert!(!report.overall);
        assert!(report.browser_support.ok);
        assert!(report.service_worker.ok);
        assert!(!report.token.ok);
    }
}
