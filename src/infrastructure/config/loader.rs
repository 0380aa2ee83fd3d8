use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Default project config file, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "linkgate.yaml";

/// Prefix for environment overrides, e.g. `LINKGATE_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "LINKGATE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Server host cannot be empty")]
    EmptyHost,

    #[error("Invalid port: {0}. Must be non-zero")]
    InvalidPort(u16),

    #[error("Invalid request_timeout_secs: {0}. Must be at least 1")]
    InvalidRequestTimeout(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Unknown connection driver: {0}. Must be one of: loopback")]
    UnknownDriver(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `linkgate.yaml` in the working directory, if present
    /// 3. Environment variables (`LINKGATE_*` prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        Self::load_with(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Same precedence as [`ConfigLoader::load`] with an explicit config file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        Self::load_with(path)
    }

    fn load_with(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.server.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        if config.server.port == 0 {
            return Err(ConfigError::InvalidPort(config.server.port));
        }

        if config.server.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidRequestTimeout(
                config.server.request_timeout_secs,
            ));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        if config.logging.level().is_none() {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.connection.driver != "loopback" {
            return Err(ConfigError::UnknownDriver(config.connection.driver.clone()));
        }

        Ok(())
    }
}
