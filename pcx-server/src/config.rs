//! Application configuration
//!
//! Resolution order, later wins:
//! 1. built-in defaults
//! 2. JSON config file (`--config`, or `<config dir>/pc-metricsx/config.json` if present)
//! 3. environment variables
//! 4. command-line flags (applied by the binary)

use pcx_core::model::TelemetryWindow;
use pcx_sim::SimulationParams;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Remote publish channel for each reading
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublishConfig {
    Http { url: String },
    Udp { host: String, port: u16 },
}

/// Remote fan-curve advisory service
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// No key means the local policy is always used
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl AdvisoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-3-sonnet-20240229".to_string(),
            max_tokens: 1000,
            timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device_id: String,
    pub tick_interval_ms: u64,
    /// Fixed RNG seed; random when unset
    pub seed: Option<u64>,
    pub console_output: bool,
    pub local_logging: bool,
    pub log_file: PathBuf,
    /// Readings kept in memory for the query API
    pub history_capacity: usize,
    pub publish: Option<PublishConfig>,
    pub advisory: AdvisoryConfig,
    /// Query API bind address; the API is disabled when unset
    pub listen_addr: Option<SocketAddr>,
    pub simulation: SimulationParams,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device_id: "GamingPC4".to_string(),
            tick_interval_ms: 1000,
            seed: None,
            console_output: true,
            local_logging: true,
            log_file: PathBuf::from("sensor_data_log.json"),
            history_capacity: TelemetryWindow::DEFAULT_CAPACITY,
            publish: None,
            advisory: AdvisoryConfig::default(),
            listen_addr: Some(SocketAddr::from(([127, 0, 0, 1], 5000))),
            simulation: SimulationParams::default(),
        }
    }
}

impl AppConfig {
    /// Default config file location
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pc-metricsx")
            .join("config.json")
    }

    /// Load from `path` (must exist) or the default location (optional),
    /// then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Self::config_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("PCX_DEVICE_ID") {
            self.device_id = id;
        }
        if let Some(path) = lookup("PCX_LOG_FILE") {
            self.log_file = PathBuf::from(path);
        }
        if let Some(ms) = lookup("PCX_TICK_MS") {
            self.tick_interval_ms = parse_env("PCX_TICK_MS", &ms)?;
        }
        if let Some(seed) = lookup("PCX_SEED") {
            self.seed = Some(parse_env("PCX_SEED", &seed)?);
        }
        if let Some(url) = lookup("PCX_PUBLISH_URL") {
            self.publish = Some(PublishConfig::Http { url });
        }
        if let Some(key) = lookup("CLAUDE_API_KEY").or_else(|| lookup("ANTHROPIC_API_KEY")) {
            if !key.trim().is_empty() {
                self.advisory.api_key = Some(key);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "tick_interval_ms".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.local_logging && self.log_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                key: "log_file".to_string(),
                reason: "local logging enabled without a log path".to_string(),
            });
        }
        self.simulation
            .validate()
            .map_err(|reason| ConfigError::Invalid {
                key: "simulation".to_string(),
                reason,
            })
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
