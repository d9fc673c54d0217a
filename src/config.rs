use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::money::{Currency, StoreCurrency};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_PAYSTACK_BASE_URL: &str = "https://api.paystack.co";
const DEFAULT_SHIPPING_COST: Decimal = dec!(2000.00);

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Currency code of catalog prices; must match the compiled store currency
    #[serde(default = "default_store_currency")]
    #[validate(custom = "validate_store_currency")]
    pub store_currency: String,

    /// Shipping charged when no active shipping method exists
    #[serde(default = "default_shipping_cost")]
    #[validate(custom = "validate_non_negative_amount")]
    pub default_shipping_cost: Decimal,

    /// Paystack public key handed to the hosted payment popup
    #[serde(default)]
    pub paystack_public_key: Option<String>,

    /// Paystack secret key, used for verification calls and webhook signatures
    #[serde(default)]
    pub paystack_secret_key: Option<String>,

    #[serde(default = "default_paystack_base_url")]
    #[validate(url)]
    pub paystack_base_url: String,

    /// Timeout for outbound gateway calls
    #[serde(default = "default_gateway_timeout_secs")]
    #[validate(range(min = 1, max = 120))]
    pub gateway_timeout_secs: u64,

    /// Externally visible base URL, used to build payment callback links
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Shared token for administrative endpoints; unset disables them
    #[serde(default)]
    pub admin_api_token: Option<String>,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the
    /// connection string and environment.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            host: "0.0.0.0".to_string(),
            port: default_port(),
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            store_currency: default_store_currency(),
            default_shipping_cost: default_shipping_cost(),
            paystack_public_key: None,
            paystack_secret_key: None,
            paystack_base_url: default_paystack_base_url(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
            public_base_url: default_public_base_url(),
            admin_api_token: None,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
            || self.environment.eq_ignore_ascii_case("dev")
            || self.environment.eq_ignore_ascii_case("test")
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
            || self.environment.eq_ignore_ascii_case("prod")
    }

    /// Parsed CORS origins, empty when none are configured
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// URL the payment popup returns to for server-side verification
    pub fn payment_verify_url(&self, reference: &str) -> String {
        format!(
            "{}/api/v1/payments/verify/{}",
            self.public_base_url.trim_end_matches('/'),
            reference
        )
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_production() && self.cors_origins().is_empty() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some("Set APP__CORS_ALLOWED_ORIGINS in production".into());
            errors.add("cors_allowed_origins", err);
        }

        if self.is_production()
            && self
                .paystack_secret_key
                .as_deref()
                .map_or(true, |k| k.trim().is_empty())
        {
            let mut err = ValidationError::new("paystack_secret_key_required");
            err.message = Some(
                "Set APP__PAYSTACK_SECRET_KEY in production; webhook signatures cannot be verified without it"
                    .into(),
            );
            errors.add("paystack_secret_key", err);
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_pool_bounds");
            err.message = Some("db_min_connections must not exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    8
}
fn default_db_idle_timeout_secs() -> u64 {
    300
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_store_currency() -> String {
    StoreCurrency::CODE.to_string()
}

fn default_shipping_cost() -> Decimal {
    DEFAULT_SHIPPING_COST
}

fn default_paystack_base_url() -> String {
    DEFAULT_PAYSTACK_BASE_URL.to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    15
}

fn default_public_base_url() -> String {
    format!("http://localhost:{}", DEFAULT_PORT)
}

fn default_event_channel_capacity() -> usize {
    1024
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

fn validate_store_currency(code: &str) -> Result<(), ValidationError> {
    if code.eq_ignore_ascii_case(StoreCurrency::CODE) {
        return Ok(());
    }
    let mut err = ValidationError::new("store_currency");
    err.message = Some(format!("This build prices the catalog in {}", StoreCurrency::CODE).into());
    Err(err)
}

fn validate_non_negative_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        let mut err = ValidationError::new("negative_amount");
        err.message = Some("Amount must not be negative".into());
        return Err(err);
    }
    Ok(())
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 || capacity > 100_000 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("Must be between 1 and 100000".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("partstore_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://partstore.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(
            File::with_name(&config_dir.join("default").to_string_lossy()).required(false),
        )
        .add_source(File::with_name(&config_dir.join(run_env).to_string_lossy()).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn base_config() -> AppConfig {
        AppConfig::new("sqlite::memory:".into(), "production".into())
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::new("sqlite::memory:".into(), "development".into());
        assert!(cfg.validate().is_ok());
        assert!(cfg.validate_additional_constraints().is_ok());
        assert_eq!(cfg.default_shipping_cost, dec!(2000));
        assert_eq!(cfg.paystack_base_url, "https://api.paystack.co");
    }

    #[test]
    fn foreign_store_currency_is_rejected() {
        let mut cfg = base_config();
        cfg.store_currency = "USD".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn production_requires_origins_and_gateway_secret() {
        let mut cfg = base_config();
        assert!(cfg.validate_additional_constraints().is_err());

        cfg.cors_allowed_origins = Some("https://shop.example.com".into());
        assert!(cfg.validate_additional_constraints().is_err());

        cfg.paystack_secret_key = Some("sk_live_x".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn event_channel_capacity_is_bounded() {
        let mut cfg = AppConfig::new("sqlite::memory:".into(), "development".into());
        cfg.event_channel_capacity = 0;
        assert!(cfg.validate().is_err());

        cfg.event_channel_capacity = 100_001;
        assert!(cfg.validate().is_err());

        cfg.event_channel_capacity = 64;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some(" https://a.test, ,https://b.test ".into());
        assert_eq!(cfg.cors_origins(), vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn verify_url_is_built_from_public_base() {
        let mut cfg = base_config();
        cfg.public_base_url = "https://shop.example.com/".into();
        assert_eq!(
            cfg.payment_verify_url("PAY-1"),
            "https://shop.example.com/api/v1/payments/verify/PAY-1"
        );
    }

    #[test]
    fn files_are_layered_by_environment() {
        let dir = TempDir::new().unwrap();
        let mut default = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            default,
            "database_url = \"sqlite::memory:\"\nport = 9000\ndefault_shipping_cost = 1500"
        )
        .unwrap();
        let mut staging = std::fs::File::create(dir.path().join("staging.toml")).unwrap();
        writeln!(staging, "port = 9100\nadmin_api_token = \"tok\"").unwrap();

        let cfg = load_config_from(dir.path(), "staging").unwrap();
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.environment, "staging");
        assert_eq!(cfg.default_shipping_cost, dec!(1500));
        assert_eq!(cfg.admin_api_token.as_deref(), Some("tok"));
    }
}
