//! Permission and token orchestration.
//!
//! `ensure_enabled` is the single entry point a session calls to end up
//! with working push notifications: classify the runtime, register the
//! service worker, walk the permission state machine, fetch a token, and
//! persist it. Transient failures, flaky service worker registration and
//! token fetches included, are retried on a bounded linear schedule;
//! explicit denials and unsupported runtimes are terminal and consume no
//! retry budget.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use rapid_common::retry::{retry_with_policy, RetryAction, RetryPolicy};
use rapid_common::services::BoxFuture;

use crate::capability::{classify_environment, ClientRuntime, PushSupport};
use crate::error::NotifyError;
use crate::models::DeviceMetadata;
use crate::registry::TokenRegistry;

/// The browser's notification permission state.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// The user has granted notification permission.
    Granted,
    /// The user has explicitly refused. Only a browser-settings change can
    /// revert this.
    Denied,
    /// No decision yet; a prompt may be shown.
    Default,
}

/// Errors surfaced by a [`PushPlatform`] implementation.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Service worker registration failed: {0}")]
    ServiceWorker(String),
    #[error("Permission request failed: {0}")]
    Permission(String),
    #[error("Token fetch failed: {0}")]
    Token(String),
}

impl PlatformError {
    /// Whether this error encodes a hard denial rather than a transient
    /// fault. Hard denials abort the retry loop immediately.
    pub fn is_terminal_denial(&self) -> bool {
        let message = self.to_string().to_lowercase();
        message.contains("denied") || message.contains("blocked")
    }
}

/// The browser-side push surface, as seen from the orchestrator.
///
/// Production sessions implement this over the actual browser APIs; tests
/// implement it with scripted mocks. All methods are cheap queries or
/// single actions; retry sits above this trait, never inside it.
pub trait PushPlatform: Send + Sync {
    /// The current permission state, read without prompting.
    fn permission_state(&self) -> BoxFuture<'_, PermissionState, PlatformError>;

    /// Show the permission prompt and return the resulting state.
    fn request_permission(&self) -> BoxFuture<'_, PermissionState, PlatformError>;

    /// Fetch a push token for this installation.
    fn fetch_token(&self) -> BoxFuture<'_, String, PlatformError>;

    /// Register the messaging service worker, idempotently.
    fn register_service_worker(&self) -> BoxFuture<'_, (), PlatformError>;

    /// Whether the messaging service worker specifically is already
    /// registered. Read-only; used by diagnostics.
    fn has_messaging_worker(&self) -> BoxFuture<'_, bool, PlatformError>;

    /// Device metadata to attach to the registered token.
    fn device_metadata(&self) -> DeviceMetadata;
}

/// What `ensure_enabled` resolved to.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableOutcome {
    /// True when a token was obtained and persisted.
    pub enabled: bool,
    /// The token, when enabled.
    #[serde(default)]
    pub token: Option<String>,
    /// Human-readable reason when not enabled.
    #[serde(default)]
    pub reason: Option<String>,
    /// True when the runtime could support push after installing the PWA.
    #[serde(default)]
    pub requires_pwa: bool,
}

impl EnableOutcome {
    fn enabled(token: String) -> Self {
        Self {
            enabled: true,
            token: Some(token),
            reason: None,
            requires_pwa: false,
        }
    }

    fn disabled(reason: impl Into<String>) -> Self {
        Self {
            enabled: false,
            token: None,
            reason: Some(reason.into()),
            requires_pwa: false,
        }
    }

    fn needs_pwa() -> Self {
        Self {
            enabled: false,
            token: None,
            reason: Some("install the app to the home screen to enable notifications".into()),
            requires_pwa: true,
        }
    }
}

/// Walks a session from "maybe supported" to "token registered".
pub struct PermissionOrchestrator {
    registry: Arc<TokenRegistry>,
    policy: RetryPolicy,
}

impl PermissionOrchestrator {
    pub fn new(registry: Arc<TokenRegistry>) -> Self {
        Self {
            registry,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(registry: Arc<TokenRegistry>, policy: RetryPolicy) -> Self {
        Self { registry, policy }
    }

    /// Ensure push notifications are enabled for this session.
    ///
    /// Unsupported runtimes and PWA-required runtimes return a disabled
    /// outcome before any platform call is made. Explicit permission
    /// denials are terminal. Transient faults, service worker registration
    /// and token fetch included, are retried on the configured schedule
    /// before giving up.
    ///
    /// # Errors
    ///
    /// Only store failures while persisting the obtained token propagate;
    /// every platform-side failure resolves to a disabled outcome instead.
    pub async fn ensure_enabled(
        &self,
        platform: &dyn PushPlatform,
        runtime: &ClientRuntime,
        owner_email: Option<&str>,
    ) -> Result<EnableOutcome, NotifyError> {
        let capability = classify_environment(runtime);
        match &capability.support {
            PushSupport::Unsupported { reason } => {
                debug!(reason = %reason, "push unsupported in this runtime");
                return Ok(EnableOutcome::disabled(reason.clone()));
            }
            PushSupport::RequiresPwa => {
                debug!("push requires PWA installation on this runtime");
                return Ok(EnableOutcome::needs_pwa());
            }
            PushSupport::UsableInstallRecommended | PushSupport::Usable => {}
        }

        let attempt_result = retry_with_policy(&self.policy, |attempt| async move {
            match self.attempt_once(platform, attempt).await {
                Ok(token) => RetryAction::Success(token),
                Err(AttemptError::Terminal(reason)) => RetryAction::Fail(reason),
                Err(AttemptError::Transient(reason)) => RetryAction::Retry(reason),
            }
        })
        .await;

        let token = match attempt_result {
            Ok(token) => token,
            Err(reason) => return Ok(EnableOutcome::disabled(reason)),
        };

        let metadata = platform.device_metadata();
        self.registry
            .upsert_token(&token, owner_email, &metadata)
            .await?;
        info!(owner = owner_email.unwrap_or("<anonymous>"), "push notifications enabled");

        Ok(EnableOutcome::enabled(token))
    }

    /// One pass through the permission state machine. Service worker
    /// registration is part of the attempt: a flaky registration consumes
    /// one retry rather than aborting the whole flow.
    async fn attempt_once(
        &self,
        platform: &dyn PushPlatform,
        attempt: u32,
    ) -> Result<String, AttemptError> {
        if let Err(err) = platform.register_service_worker().await {
            warn!(attempt, error = %err, "service worker registration failed");
            return Err(AttemptError::Transient(format!(
                "service worker registration failed: {err}"
            )));
        }

        let state = platform
            .permission_state()
            .await
            .map_err(|err| AttemptError::Transient(format!("permission query failed: {err}")))?;

        let state = match state {
            PermissionState::Granted => PermissionState::Granted,
            PermissionState::Denied => {
                return Err(AttemptError::Terminal(
                    "notification permission is blocked in browser settings".to_string(),
                ));
            }
            PermissionState::Default => {
                debug!(attempt, "requesting notification permission");
                match platform.request_permission().await {
                    Ok(state) => state,
                    Err(err) if err.is_terminal_denial() => {
                        return Err(AttemptError::Terminal(format!(
                            "permission request denied: {err}"
                        )));
                    }
                    Err(err) => {
                        return Err(AttemptError::Transient(format!(
                            "permission request failed: {err}"
                        )));
                    }
                }
            }
        };

        match state {
            PermissionState::Granted => match platform.fetch_token().await {
                Ok(token) => Ok(token),
                Err(err) => Err(AttemptError::Transient(format!(
                    "token generation failed: {err}"
                ))),
            },
            PermissionState::Denied => Err(AttemptError::Terminal(
                "notification permission denied".to_string(),
            )),
            // Prompt dismissed without a decision; worth one more try.
            PermissionState::Default => Err(AttemptError::Transient(
                "permission prompt dismissed".to_string(),
            )),
        }
    }
}

enum AttemptError {
    Transient(String),
    Terminal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapid_store::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    const IOS_SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 Version/17.0 Mobile/15E148 Safari/604.1";
    const DESKTOP_CHROME: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
        Chrome/120.0.0.0 Safari/537.36";

    fn runtime(user_agent: &str, standalone: bool) -> ClientRuntime {
        ClientRuntime {
            user_agent: user_agent.to_string(),
            standalone,
            notification_api: true,
            service_worker_api: true,
        }
    }

    /// Scripted platform double. Permission states are consumed in order;
    /// the last state repeats once the script is exhausted.
    struct MockPlatform {
        states: Mutex<Vec<PermissionState>>,
        prompt_results: Mutex<Vec<PermissionState>>,
        token_failures_before_success: AtomicU32,
        worker_failures_before_success: AtomicU32,
        state_calls: AtomicU32,
        prompt_calls: AtomicU32,
        token_calls: AtomicU32,
        worker_calls: AtomicU32,
    }

    impl MockPlatform {
        fn new(states: Vec<PermissionState>) -> Self {
            Self {
                states: Mutex::new(states),
                prompt_results: Mutex::new(Vec::new()),
                token_failures_before_success: AtomicU32::new(0),
                worker_failures_before_success: AtomicU32::new(0),
                state_calls: AtomicU32::new(0),
                prompt_calls: AtomicU32::new(0),
                token_calls: AtomicU32::new(0),
                worker_calls: AtomicU32::new(0),
            }
        }

        fn with_prompt_results(self, results: Vec<PermissionState>) -> Self {
            *self.prompt_results.lock().unwrap() = results;
            self
        }

        fn failing_token_fetches(self, failures: u32) -> Self {
            self.token_failures_before_success
                .store(failures, Ordering::SeqCst);
            self
        }

        fn failing_worker_registrations(self, failures: u32) -> Self {
            self.worker_failures_before_success
                .store(failures, Ordering::SeqCst);
            self
        }

        fn next(queue: &Mutex<Vec<PermissionState>>) -> PermissionState {
            let mut queue = queue.lock().unwrap();
            if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue.first().copied().unwrap_or(PermissionState::Default)
            }
        }
    }

    impl PushPlatform for MockPlatform {
        fn permission_state(&self) -> BoxFuture<'_, PermissionState, PlatformError> {
            self.state_calls.fetch_add(1, Ordering::SeqCst);
            let state = Self::next(&self.states);
            Box::pin(async move { Ok(state) })
        }

        fn request_permission(&self) -> BoxFuture<'_, PermissionState, PlatformError> {
            self.prompt_calls.fetch_add(1, Ordering::SeqCst);
            let state = Self::next(&self.prompt_results);
            Box::pin(async move { Ok(state) })
        }

        fn fetch_token(&self) -> BoxFuture<'_, String, PlatformError> {
            self.token_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.token_failures_before_success.load(Ordering::SeqCst);
            if remaining > 0 {
                self.token_failures_before_success
                    .store(remaining - 1, Ordering::SeqCst);
                Box::pin(async { Err(PlatformError::Token("transport unavailable".into())) })
            } else {
                Box::pin(async { Ok("tok-fresh".to_string()) })
            }
        }

        fn register_service_worker(&self) -> BoxFuture<'_, (), PlatformError> {
            self.worker_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.worker_failures_before_success.load(Ordering::SeqCst);
            if remaining > 0 {
                self.worker_failures_before_success
                    .store(remaining - 1, Ordering::SeqCst);
                Box::pin(async {
                    Err(PlatformError::ServiceWorker(
                        "transient network error".into(),
                    ))
                })
            } else {
                Box::pin(async { Ok(()) })
            }
        }

        fn has_messaging_worker(&self) -> BoxFuture<'_, bool, PlatformError> {
            Box::pin(async { Ok(true) })
        }

        fn device_metadata(&self) -> DeviceMetadata {
            DeviceMetadata::default()
        }
    }

    fn orchestrator() -> (PermissionOrchestrator, Arc<TokenRegistry>) {
        let registry = Arc::new(TokenRegistry::new(Arc::new(MemoryStore::new())));
        (PermissionOrchestrator::new(registry.clone()), registry)
    }

    #[tokio::test(start_paused = true)]
    async fn granted_permission_enables_and_persists_the_token() {
        let (orchestrator, registry) = orchestrator();
        let platform = MockPlatform::new(vec![PermissionState::Granted]);

        let outcome = orchestrator
            .ensure_enabled(&platform, &runtime(DESKTOP_CHROME, false), Some("user@example.com"))
            .await
            .unwrap();

        assert!(outcome.enabled);
        assert_eq!(outcome.token.as_deref(), Some("tok-fresh"));
        assert_eq!(platform.prompt_calls.load(Ordering::SeqCst), 0);

        let tokens = registry
            .token_values_for_owner("user@example.com")
            .await
            .unwrap();
        assert_eq!(tokens, vec!["tok-fresh".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn ios_browser_outside_pwa_never_touches_the_platform() {
        let (orchestrator, _) = orchestrator();
        let platform = MockPlatform::new(vec![PermissionState::Default]);

        let outcome = orchestrator
            .ensure_enabled(&platform, &runtime(IOS_SAFARI, false), None)
            .await
            .unwrap();

        assert!(!outcome.enabled);
        assert!(outcome.requires_pwa);
        assert_eq!(platform.worker_calls.load(Ordering::SeqCst), 0);
        assert_eq!(platform.state_calls.load(Ordering::SeqCst), 0);
        assert_eq!(platform.prompt_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_denial_is_terminal_with_no_retries() {
        let (orchestrator, _) = orchestrator();
        let platform = MockPlatform::new(vec![PermissionState::Denied]);

        let outcome = orchestrator
            .ensure_enabled(&platform, &runtime(DESKTOP_CHROME, false), None)
            .await
            .unwrap();

        assert!(!outcome.enabled);
        assert!(outcome.reason.as_deref().unwrap().contains("blocked"));
        assert_eq!(platform.state_calls.load(Ordering::SeqCst), 1);
        assert_eq!(platform.token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_denial_is_terminal() {
        let (orchestrator, _) = orchestrator();
        let platform = MockPlatform::new(vec![PermissionState::Default])
            .with_prompt_results(vec![PermissionState::Denied]);

        let outcome = orchestrator
            .ensure_enabled(&platform, &runtime(DESKTOP_CHROME, false), None)
            .await
            .unwrap();

        assert!(!outcome.enabled);
        assert_eq!(platform.prompt_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn token_failures_exhaust_the_retry_budget_then_surface() {
        let (orchestrator, _) = orchestrator();
        // Default policy: initial attempt plus two retries, all failing.
        let platform =
            MockPlatform::new(vec![PermissionState::Granted]).failing_token_fetches(3);

        let outcome = orchestrator
            .ensure_enabled(&platform, &runtime(DESKTOP_CHROME, false), None)
            .await
            .unwrap();

        assert!(!outcome.enabled);
        assert!(outcome
            .reason
            .as_deref()
            .unwrap()
            .contains("token generation failed"));
        assert_eq!(platform.token_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_token_failure_recovers_within_budget() {
        let (orchestrator, registry) = orchestrator();
        let platform =
            MockPlatform::new(vec![PermissionState::Granted]).failing_token_fetches(2);

        let outcome = orchestrator
            .ensure_enabled(&platform, &runtime(DESKTOP_CHROME, false), Some("user@example.com"))
            .await
            .unwrap();

        assert!(outcome.enabled);
        assert_eq!(platform.token_calls.load(Ordering::SeqCst), 3);
        let tokens = registry
            .token_values_for_owner("user@example.com")
            .await
            .unwrap();
        assert_eq!(tokens.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flaky_worker_registration_recovers_within_budget() {
        let (orchestrator, registry) = orchestrator();
        let platform = MockPlatform::new(vec![PermissionState::Granted])
            .failing_worker_registrations(1);

        let outcome = orchestrator
            .ensure_enabled(&platform, &runtime(DESKTOP_CHROME, false), Some("user@example.com"))
            .await
            .unwrap();

        assert!(outcome.enabled);
        // The failed registration consumed one retry, then the next
        // attempt ran the whole flow.
        assert_eq!(platform.worker_calls.load(Ordering::SeqCst), 2);
        assert_eq!(platform.token_calls.load(Ordering::SeqCst), 1);
        let tokens = registry
            .token_values_for_owner("user@example.com")
            .await
            .unwrap();
        assert_eq!(tokens.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_registration_failures_exhaust_the_budget_then_surface() {
        let (orchestrator, _) = orchestrator();
        let platform = MockPlatform::new(vec![PermissionState::Granted])
            .failing_worker_registrations(3);

        let outcome = orchestrator
            .ensure_enabled(&platform, &runtime(DESKTOP_CHROME, false), None)
            .await
            .unwrap();

        assert!(!outcome.enabled);
        assert!(outcome
            .reason
            .as_deref()
            .unwrap()
            .contains("service worker registration failed"));
        assert_eq!(platform.worker_calls.load(Ordering::SeqCst), 3);
        assert_eq!(platform.token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dismissed_prompt_retries_then_gives_up() {
        let (orchestrator, _) = orchestrator();
        let platform = MockPlatform::new(vec![PermissionState::Default])
            .with_prompt_results(vec![PermissionState::Default]);

        let outcome = orchestrator
            .ensure_enabled(&platform, &runtime(DESKTOP_CHROME, false), None)
            .await
            .unwrap();

        assert!(!outcome.enabled);
        // Initial attempt plus the two retries of the default policy.
        assert_eq!(platform.prompt_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_enable_registers_a_token_without_an_owner() {
        let (orchestrator, registry) = orchestrator();
        let platform = MockPlatform::new(vec![PermissionState::Granted]);

        let outcome = orchestrator
            .ensure_enabled(&platform, &runtime(DESKTOP_CHROME, false), None)
            .await
            .unwrap();

        assert!(outcome.enabled);
        // No owner, so no email-keyed lookup finds it.
        let tokens = registry
            .token_values_for_owner("user@example.com")
            .await
            .unwrap();
        assert!(tokens.is_empty());
    }
}
