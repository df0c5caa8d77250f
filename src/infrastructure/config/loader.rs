use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::{AuthMethod, Config};
use crate::infrastructure::logging::{LogFormat, RotationPolicy, parse_log_level};

/// Project-local directory holding the configuration files
pub const CONFIG_DIR: &str = ".azc-fixer";

/// Environment variable prefix; nested keys use `__`
pub const ENV_PREFIX: &str = "AZC_FIXER_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("worker.endpoint must be set (e.g. AZC_FIXER_WORKER__ENDPOINT)")]
    MissingEndpoint,

    #[error("worker.model cannot be empty")]
    EmptyModel,

    #[error("worker.auth.method is api_key but worker.api_key is not set")]
    MissingApiKey,

    #[error("worker.auth.cli_program cannot be empty")]
    EmptyCliProgram,

    #[error("workspace.root cannot be empty")]
    EmptyWorkspaceRoot,

    #[error("workspace.target_file cannot be empty")]
    EmptyTargetFile,

    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    #[error("Invalid max_recovery_attempts: {0}. Must be at least 1")]
    InvalidMaxRecoveryAttempts(u32),

    #[error("Invalid max_poll_attempts: {0}. Must be at least 1")]
    InvalidMaxPollAttempts(u32),

    #[error("Invalid poll_interval_secs: {0}. Must be at least 1")]
    InvalidPollInterval(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .azc-fixer/config.yaml (project config)
    /// 3. .azc-fixer/local.yaml (local overrides, optional)
    /// 4. Environment variables (AZC_FIXER_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(CONFIG_DIR)
    }

    /// Same precedence as [`ConfigLoader::load`] with the YAML files taken from `dir`
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.worker.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if config.worker.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        let auth = &config.worker.auth;
        let has_key = config.worker.api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        if auth.method == AuthMethod::ApiKey && !has_key {
            return Err(ConfigError::MissingApiKey);
        }
        if auth.method != AuthMethod::ApiKey && !has_key && auth.cli_program.trim().is_empty() {
            return Err(ConfigError::EmptyCliProgram);
        }
        if config.workspace.root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyWorkspaceRoot);
        }
        if config.workspace.target_file.trim().is_empty() {
            return Err(ConfigError::EmptyTargetFile);
        }

        if config.convergence.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(
                config.convergence.max_iterations,
            ));
        }
        if config.convergence.max_recovery_attempts == 0 {
            return Err(ConfigError::InvalidMaxRecoveryAttempts(
                config.convergence.max_recovery_attempts,
            ));
        }

        if config.worker.max_poll_attempts == 0 {
            return Err(ConfigError::InvalidMaxPollAttempts(
                config.worker.max_poll_attempts,
            ));
        }
        if config.worker.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidPollInterval(
                config.worker.poll_interval_secs,
            ));
        }

        parse_log_level(&config.logging.level)?;
        config.logging.format.parse::<LogFormat>()?;
        config.logging.rotation.parse::<RotationPolicy>()?;

        let retry = &config.worker.retry;
        if retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(retry.max_retries));
        }
        if retry.initial_backoff_ms >= retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                retry.initial_backoff_ms,
                retry.max_backoff_ms,
            ));
        }

        Ok(())
    }
}
