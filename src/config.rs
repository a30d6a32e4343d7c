use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use url::Url;
use validator::{Validate, ValidationError};

use crate::auth::session_file_path;
use crate::errors::ClientError;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GRACE_PERIOD_DAYS: u32 = 2;
const CONFIG_DIR: &str = "config";
const ENV_PREFIX: &str = "LABFLOW";

/// Client configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the lab request API, e.g. `https://lab.example.edu/api`
    #[validate(url)]
    pub api_base_url: String,

    /// Per-request timeout in seconds (1s - 5min)
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,

    /// Days after the experiment date during which admins may still allocate
    #[serde(default = "default_grace_period_days")]
    #[validate(range(max = 14))]
    pub grace_period_days: u32,

    /// Where the session token is persisted; defaults to ~/.labflow/session.json
    #[serde(default)]
    pub session_path: Option<String>,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: default_request_timeout_secs(),
            grace_period_days: default_grace_period_days(),
            session_path: None,
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parsed base URL, always ending in `/` so relative joins keep the path prefix.
    pub fn base_url(&self) -> Result<Url, ClientError> {
        let mut raw = self.api_base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw)
            .map_err(|e| ClientError::Config(format!("invalid api_base_url '{}': {}", raw, e)))
    }

    /// Configured session path, falling back to the per-user default.
    pub fn session_path(&self) -> Option<PathBuf> {
        self.session_path
            .as_ref()
            .filter(|raw| !raw.trim().is_empty())
            .map(PathBuf::from)
            .or_else(session_file_path)
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ClientConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

impl From<ClientConfigError> for ClientError {
    fn from(err: ClientConfigError) -> Self {
        ClientError::Config(err.to_string())
    }
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_grace_period_days() -> u32 {
    DEFAULT_GRACE_PERIOD_DAYS
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("labflow={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().with_writer(std::io::stderr).try_init();
    } else {
        let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
    }
}

/// Loads client configuration from `./config` and the environment.
pub fn load_config() -> Result<ClientConfig, ClientConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. `{dir}/default.toml`
/// 3. `{dir}/{RUN_ENV}.toml`
/// 4. Environment variables (`LABFLOW__*`)
pub fn load_config_from(dir: &Path) -> Result<ClientConfig, ClientConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            dir.display()
        );
    }

    let config = Config::builder()
        .set_default("api_base_url", DEFAULT_API_BASE_URL)?
        .set_default("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS as i64)?
        .set_default("grace_period_days", i64::from(DEFAULT_GRACE_PERIOD_DAYS))?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
        .add_source(File::with_name(&dir.join(&run_env).to_string_lossy()).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let client_config: ClientConfig = config.try_deserialize()?;

    client_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        ClientConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(client_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let cfg = ClientConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.grace_period_days, 2);
    }

    #[test]
    fn base_url_keeps_path_prefix() {
        let cfg = ClientConfig::new("https://lab.example.edu/api");
        let url = cfg.base_url().unwrap();
        assert_eq!(
            url.join("requests/r1").unwrap().as_str(),
            "https://lab.example.edu/api/requests/r1"
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut cfg = ClientConfig::default();
        cfg.request_timeout_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ClientConfig::default();
        cfg.log_level = "verbose".into();
        assert!(cfg.validate().is_err());

        let mut cfg = ClientConfig::default();
        cfg.api_base_url = "not a url".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn explicit_session_path_wins() {
        let mut cfg = ClientConfig::default();
        cfg.session_path = Some("/tmp/labflow-test/session.json".into());
        assert_eq!(
            cfg.session_path(),
            Some(PathBuf::from("/tmp/labflow-test/session.json"))
        );
    }

    #[test]
    fn loads_values_from_default_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
                api_base_url = "https://lab.example.edu/api"
                request_timeout_secs = 12
                log_level = "debug"
            "#,
        )
        .unwrap();

        let cfg = load_config_from(dir.path()).unwrap();
        assert_eq!(cfg.api_base_url, "https://lab.example.edu/api");
        assert_eq!(cfg.request_timeout_secs, 12);
        assert_eq!(cfg.log_level(), "debug");
        assert_eq!(cfg.grace_period_days, 2);
    }

    #[test]
    fn invalid_file_values_fail_validation() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "request_timeout_secs = 900\n",
        )
        .unwrap();

        assert!(matches!(
            load_config_from(dir.path()),
            Err(ClientConfigError::Validation(_))
        ));
    }
}
