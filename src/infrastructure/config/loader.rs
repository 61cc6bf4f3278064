//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    #[error("invalid context_window: {0}. Must be at least 2")]
    InvalidContextWindow(usize),

    #[error("executor interpreter cannot be empty")]
    EmptyInterpreter,

    #[error("invalid executor timeout: {0}. Must be positive")]
    InvalidTimeout(u64),

    #[error("invalid max_output_bytes: {0}. Must be positive")]
    InvalidOutputCap(usize),

    #[error("invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "invalid backoff configuration: initial_backoff_ms ({0}) must be <= max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `.hepcode/config.yaml` (project config)
    /// 3. `.hepcode/local.yaml` (project local overrides, optional)
    /// 4. Environment variables (`HEPCODE_*` prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".hepcode/config.yaml"))
            .merge(Yaml::file(".hepcode/local.yaml"))
            .merge(Env::prefixed("HEPCODE_").split("__"))
            .extract()
            .context("failed to extract configuration")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.session.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(
                config.session.max_iterations,
            ));
        }
        if config.session.context_window < 2 {
            return Err(ConfigError::InvalidContextWindow(
                config.session.context_window,
            ));
        }

        if config.executor.interpreter.trim().is_empty() {
            return Err(ConfigError::EmptyInterpreter);
        }
        if config.executor.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(config.executor.timeout_secs));
        }
        if config.executor.max_output_bytes == 0 {
            return Err(ConfigError::InvalidOutputCap(
                config.executor.max_output_bytes,
            ));
        }

        if config.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.retry.max_retries));
        }
        if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
        match config.logging.format.as_str() {
            "json" | "pretty" => {}
            other => return Err(ConfigError::InvalidLogFormat(other.to_string())),
        }

        Ok(())
    }
}
