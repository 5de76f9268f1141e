use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::schema::SchemaSource;
use crate::search::{ElasticsearchConfig, SearchConfig};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Crash-report index connection
    #[serde(default)]
    pub backend: ElasticsearchConfig,

    /// Where the field schema comes from
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Search defaults and limits
    #[serde(default)]
    pub search: SearchConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: CRASH_QUERY_)
            .add_source(
                config::Environment::with_prefix("CRASH_QUERY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults only
    pub fn embedded() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Mapping file; the bundled crash-report mapping is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Reload the schema on SIGHUP
    #[serde(default)]
    pub reload_on_sighup: bool,
}

impl SchemaConfig {
    pub fn source(&self) -> SchemaSource {
        match &self.path {
            Some(path) => SchemaSource::File(path.clone()),
            None => SchemaSource::Bundled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "crash-query".to_string()
}

fn default_true() -> bool {
    true
}
