//! Service configuration.
//!
//! Loaded once at startup, from the environment or from a YAML file named by
//! `FEEDBACK_CONFIG`, and validated before anything binds or connects.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_LISTEN: &str = "LISTEN";
pub const ENV_CONFIG_FILE: &str = "FEEDBACK_CONFIG";
pub const ENV_SINK_HOST: &str = "FLUENTD_HOST";
pub const ENV_SINK_PORT: &str = "FLUENTD_PORT";
pub const ENV_SINK_TAG: &str = "FLUENTD_TAG";
pub const ENV_SINK_MAX_RETRY: &str = "FLUENTD_MAX_RETRY";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_RETRY: u32 = 5;
const DEFAULT_RETRY_WAIT_MS: u64 = 500;
const DEFAULT_MAX_RETRY_WAIT_MS: u64 = 60_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub sink: SinkConfig,
}

/// Where feedback goes and how hard to try.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub tag: String,
    /// Retries after the first failed attempt.
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
    #[serde(default = "default_retry_wait_ms")]
    pub retry_wait_ms: u64,
    #[serde(default = "default_max_retry_wait_ms")]
    pub max_retry_wait_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_max_retry() -> u32 {
    DEFAULT_MAX_RETRY
}

fn default_retry_wait_ms() -> u64 {
    DEFAULT_RETRY_WAIT_MS
}

fn default_max_retry_wait_ms() -> u64 {
    DEFAULT_MAX_RETRY_WAIT_MS
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_write_timeout_ms() -> u64 {
    DEFAULT_WRITE_TIMEOUT_MS
}

impl SinkConfig {
    /// Sink settings with default retry and timeout values.
    pub fn new(host: impl Into<String>, port: u16, tag: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            tag: tag.into(),
            max_retry: DEFAULT_MAX_RETRY,
            retry_wait_ms: DEFAULT_RETRY_WAIT_MS,
            max_retry_wait_ms: DEFAULT_MAX_RETRY_WAIT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }

    pub fn max_retry_wait(&self) -> Duration {
        Duration::from_millis(self.max_retry_wait_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Config {
    /// Loads from the file named by `FEEDBACK_CONFIG`, or else from the
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(ENV_CONFIG_FILE) {
            Ok(path) if !path.is_empty() => Self::from_file(path),
            _ => Self::from_env(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup with the environment's names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr = get(ENV_LISTEN).unwrap_or_else(default_listen_addr);
        let host = get(ENV_SINK_HOST).ok_or(ConfigError::Missing(ENV_SINK_HOST))?;
        let port_raw = get(ENV_SINK_PORT).ok_or(ConfigError::Missing(ENV_SINK_PORT))?;
        let port = port_raw
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::Invalid { key: ENV_SINK_PORT, value: port_raw.clone() })?;
        let tag = get(ENV_SINK_TAG).ok_or(ConfigError::Missing(ENV_SINK_TAG))?;

        let mut sink = SinkConfig::new(host, port, tag);
        if let Some(raw) = get(ENV_SINK_MAX_RETRY) {
            sink.max_retry = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key: ENV_SINK_MAX_RETRY, value: raw.clone() })?;
        }

        let config = Self { listen_addr, sink };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the service cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_LISTEN));
        }
        if self.sink.host.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_SINK_HOST));
        }
        if self.sink.port == 0 {
            return Err(ConfigError::Invalid { key: ENV_SINK_PORT, value: "0".to_string() });
        }
        if self.sink.tag.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_SINK_TAG));
        }
        Ok(())
    }
}
