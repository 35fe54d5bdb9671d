use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError};

const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";
const CONFIG_DIR: &str = "config";

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL (Postgres in production, SQLite for local/dev)
    pub database_url: String,

    /// JWT signing secret (minimum 32 characters)
    #[validate(length(min = 32), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: u64,

    /// Token issuer claim
    #[serde(default = "default_issuer")]
    pub auth_issuer: String,

    /// Token audience claim
    #[serde(default = "default_audience")]
    pub auth_audience: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    /// Run schema migrations on startup
    #[serde(default = "default_true")]
    pub auto_migrate: bool,

    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub db_min_connections: u32,

    /// Comma-separated list of allowed CORS origins; unset means permissive
    /// CORS in development and an error in production.
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Off by default: tower-http rejects credentialed CORS combined with
    /// wildcard methods/headers, so enabling this also requires narrowing
    /// those lists.
    #[serde(default)]
    pub cors_allow_credentials: bool,
}

fn default_jwt_expiration() -> u64 {
    3600
}
fn default_issuer() -> String {
    "cakeshop-api".to_string()
}
fn default_audience() -> String {
    "cakeshop-clients".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    1
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    if secret.trim().is_empty() {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some("jwt_secret must not be blank".into());
        return Err(err);
    }
    Ok(())
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        matches!(self.environment.as_str(), "development" | "dev" | "test")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads configuration by layering `config/default.toml`, an optional
/// environment-specific file, and `APP__*` environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://cakeshop.db?mode=rwc")?
        .set_default("jwt_secret", "")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;
    Ok(app_config)
}

/// Initializes tracing using the provided log level as the default filter.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("cakeshop_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "a_test_secret_that_is_long_enough_for_validation".to_string(),
            jwt_expiration: 3600,
            auth_issuer: default_issuer(),
            auth_audience: default_audience(),
            host: default_host(),
            port: default_port(),
            environment: "test".to_string(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: 1,
            db_min_connections: 1,
            cors_allowed_origins: None,
            cors_allow_credentials: false,
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn short_jwt_secret_fails_validation() {
        let mut cfg = base_config();
        cfg.jwt_secret = "short".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn development_environments_detected() {
        let mut cfg = base_config();
        for env in ["development", "dev", "test"] {
            cfg.environment = env.to_string();
            assert!(cfg.is_development());
        }
        cfg.environment = "production".to_string();
        assert!(!cfg.is_development());
    }

    #[test]
    fn cors_credentials_are_off_unless_configured() {
        let cfg: AppConfig = serde_json::from_value(serde_json::json!({
            "database_url": "sqlite::memory:",
            "jwt_secret": "a_test_secret_that_is_long_enough_for_validation",
        }))
        .expect("minimal config deserializes");
        assert!(!cfg.cors_allow_credentials);
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let cfg = base_config();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:8080");
    }
}
