use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_TOKEN_LENGTH: u32 = 24;
const DEFAULT_EVENT_BUFFER: usize = 256;
const CONFIG_DIR: &str = "config";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Deployment environment name ("development", "production", ...)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Length of minted access and dispatcher tokens
    #[serde(default = "default_token_length")]
    #[validate(range(min = 16, max = 64, message = "Token length must be between 16 and 64"))]
    pub token_length: u32,

    /// Capacity of the domain event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_token_length() -> u32 {
    DEFAULT_TOKEN_LENGTH
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            token_length: default_token_length(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `config/default.toml`, an
    /// environment-specific overlay, and `APP_`-prefixed environment
    /// variables, in that order.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let config: AppConfig = Config::builder()
            .add_source(
                File::from(Path::new(CONFIG_DIR).join("default")).required(false),
            )
            .add_source(File::from(Path::new(CONFIG_DIR).join(&env)).required(false))
            .add_source(Environment::with_prefix("APP"))
            .build()?
            .try_deserialize()?;

        config
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
