use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_QUEUE_CONCURRENCY: usize = 5;
const DEFAULT_QUEUE_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_ADAPTER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ADAPTER_MAX_ATTEMPTS: u32 = 3;

/// Job queue configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Number of job instances processed concurrently
    #[serde(default = "default_queue_concurrency")]
    pub concurrency: usize,

    /// Queue-level retry budget for a failed job
    #[serde(default = "default_queue_max_attempts")]
    pub max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_queue_concurrency(),
            max_attempts: default_queue_max_attempts(),
        }
    }
}

/// Per-supplier adapter configuration, keyed by adapter kind (e.g. "printful")
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SupplierConfig {
    /// Partner API base URL
    #[validate(url)]
    pub base_url: String,

    /// Partner API key (bearer token)
    pub api_key: String,

    /// Per-call HTTP timeout in seconds
    #[serde(default = "default_adapter_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempt budget for the resilient request wrapper
    #[serde(default = "default_adapter_max_attempts")]
    pub max_attempts: u32,
}

/// Alerting collaborator configuration
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AlertConfig {
    /// Webhook URL alerts are posted to; alerts are disabled when unset
    pub webhook_url: Option<String>,
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Job queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Alerting collaborator settings
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Supplier adapters, keyed by adapter kind
    #[serde(default)]
    pub suppliers: HashMap<String, SupplierConfig>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_queue_concurrency() -> usize {
    DEFAULT_QUEUE_CONCURRENCY
}

fn default_queue_max_attempts() -> u32 {
    DEFAULT_QUEUE_MAX_ATTEMPTS
}

fn default_adapter_timeout_secs() -> u64 {
    DEFAULT_ADAPTER_TIMEOUT_SECS
}

fn default_adapter_max_attempts() -> u32 {
    DEFAULT_ADAPTER_MAX_ATTEMPTS
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Loads configuration from `config/default.toml`, an optional
/// per-environment file, and `FULFILLMENT__*` environment variables
/// (later sources override earlier ones).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    let config_dir = Path::new(CONFIG_DIR);

    let settings = Config::builder()
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&environment)).required(false))
        .add_source(
            Environment::with_prefix("FULFILLMENT")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = settings.try_deserialize()?;

    app_config
        .validate()
        .map_err(|e| ConfigError::Message(format!("Invalid configuration: {}", e)))?;

    info!(
        environment = %app_config.environment,
        suppliers = app_config.suppliers.len(),
        "Configuration loaded"
    );

    Ok(app_config)
}
