//! Configuration loading for the RapidNotify service.
//!
//! Configuration is layered the usual way: `config/default.*`, then an
//! environment-specific file selected by `RUN_ENV`, then environment
//! variables with the `APP_` prefix and `__` as the section separator
//! (e.g. `APP_SERVER__PORT=9000`). Secrets (API keys, auth tokens) are
//! never placed in config files; they are read from plain env vars by the
//! crates that need them.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::OnceCell;

pub mod models;
pub use models::*;

static DOTENV: OnceCell<()> = OnceCell::new();

/// Load `.env` into the process environment exactly once.
///
/// Dependent crates (and tests) call this before reading env vars so that
/// local development works without exporting everything by hand. A missing
/// `.env` file is not an error.
pub fn ensure_dotenv_loaded() {
    DOTENV.get_or_init(|| {
        if dotenv::dotenv().is_ok() {
            tracing::debug!("Loaded environment from .env file");
        }
    });
}

/// Load the application configuration.
///
/// # Errors
///
/// Returns a `ConfigError` if a config file is malformed or if the merged
/// configuration cannot be deserialized into [`AppConfig`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".to_string());

    let config = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // An entirely empty environment is still a valid configuration: every
    // section has a serde default and all channels start disabled.
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_yields_defaults() {
        let config = AppConfig::default();
        assert!(!config.use_push);
        assert!(!config.use_email);
        assert!(!config.use_sms);
        assert_eq!(config.server.port, 8086);
        assert_eq!(
            config.store.as_ref().map(|s| s.backend.as_str()),
            Some("memory")
        );
    }

    #[test]
    fn app_config_round_trips_through_json() {
        let config = AppConfig {
            use_push: true,
            fcm: Some(FcmConfig {
                project_id: Some("rapidworks-dev".to_string()),
                key_path: Some("/etc/rapidnotify/sa.json".to_string()),
                endpoint: None,
            }),
            ..AppConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert!(parsed.use_push);
        assert_eq!(
            parsed.fcm.unwrap().project_id.as_deref(),
            Some("rapidworks-dev")
        );
    }
}
