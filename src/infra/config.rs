//! For reading application configuration.

use config::{
    builder::{ConfigBuilder, DefaultState},
    ConfigError,
};
use serde::Deserialize;
use std::time::Duration;

/// Application configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    /// Server address.
    pub http_address: String,
    /// Server http port.
    pub http_port: u16,
    /// How long a request may take before it is aborted.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Maximum number of requests handled at once.
    pub concurrency_limit: usize,
}

/// Logging configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// Where to export spans over OTLP, if anywhere.
    pub otlp_endpoint: Option<String>,
}

/// Retrieve [`Config`] from the defaults, an optional `config` file,
/// and `APP__`-prefixed environment variables.
#[tracing::instrument]
pub fn load_config() -> anyhow::Result<Config> {
    let config = defaults()?
        .add_source(config::File::with_name("config").required(false))
        .add_source(config::Environment::with_prefix("app").separator("__"))
        .build()?
        .try_deserialize()?;
    Ok(config)
}

/// Built-in values, overridden by every other source.
fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("server.http_address", "0.0.0.0")?
        .set_default("server.http_port", 8080)?
        .set_default("server.request_timeout", "10s")?
        .set_default("server.concurrency_limit", 500)
}
