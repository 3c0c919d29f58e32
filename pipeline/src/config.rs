use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use api::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_WORKERS, MAX_WORKERS};
use database::{DatabaseConfig, DatabaseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::RoundId;

use crate::run::RunOptions;

pub const API_BASE_URL_ENV: &str = "PARA_STATS_API_BASE_URL";
pub const THROTTLE_MS_ENV: &str = "PARA_STATS_THROTTLE_MS";
pub const REQUEST_TIMEOUT_ENV: &str = "PARA_STATS_REQUEST_TIMEOUT_SECS";
pub const WORKERS_ENV: &str = "PARA_STATS_WORKERS";
pub const BATCH_SIZE_ENV: &str = "PARA_STATS_BATCH_SIZE";
pub const START_ROUND_ID_ENV: &str = "PARA_STATS_START_ROUND_ID";

pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Upstream API and run-shaping settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub throttle_ms: Option<u64>,
    pub request_timeout_secs: u64,
    pub workers: usize,
    pub batch_size: usize,
    pub start_round_id: RoundId,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            throttle_ms: None,
            request_timeout_secs: 30,
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            start_round_id: 0,
        }
    }
}

impl ApiSettings {
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(url) = lookup(API_BASE_URL_ENV) {
            self.base_url = url;
        }
        if let Some(ms) = lookup(THROTTLE_MS_ENV) {
            self.throttle_ms = Some(parse_env(THROTTLE_MS_ENV, &ms)?);
        }
        if let Some(secs) = lookup(REQUEST_TIMEOUT_ENV) {
            self.request_timeout_secs = parse_env(REQUEST_TIMEOUT_ENV, &secs)?;
        }
        if let Some(workers) = lookup(WORKERS_ENV) {
            self.workers = parse_env(WORKERS_ENV, &workers)?;
        }
        if let Some(size) = lookup(BATCH_SIZE_ENV) {
            self.batch_size = parse_env(BATCH_SIZE_ENV, &size)?;
        }
        if let Some(round_id) = lookup(START_ROUND_ID_ENV) {
            self.start_round_id = parse_env(START_ROUND_ID_ENV, &round_id)?;
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            throttle: self.throttle_ms.map(Duration::from_millis),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            workers: self.workers.clamp(1, MAX_WORKERS),
            batch_size: self.batch_size,
            start_round_id: self.start_round_id,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(invalid(API_BASE_URL_ENV, &self.base_url, "must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(invalid(BATCH_SIZE_ENV, "0", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid(REQUEST_TIMEOUT_ENV, "0", "must be at least 1"));
        }
        if self.workers > MAX_WORKERS {
            tracing::warn!(
                requested = self.workers,
                max = MAX_WORKERS,
                "Worker count above the maximum, clamping"
            );
        }
        Ok(())
    }
}

/// Command-line overrides, the highest-precedence configuration layer.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct CliOverrides {
    #[arg(long)]
    pub database_url: Option<String>,
    #[arg(long)]
    pub api_base_url: Option<String>,
    #[arg(long)]
    pub throttle_ms: Option<u64>,
    #[arg(short, long)]
    pub workers: Option<usize>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub start_round_id: Option<RoundId>,
}

impl CliOverrides {
    fn apply(&self, api: &mut ApiSettings) {
        if let Some(url) = &self.api_base_url {
            api.base_url = url.clone();
        }
        if let Some(ms) = self.throttle_ms {
            api.throttle_ms = Some(ms);
        }
        if let Some(workers) = self.workers {
            api.workers = workers;
        }
        if let Some(size) = self.batch_size {
            api.batch_size = size;
        }
        if let Some(round_id) = self.start_round_id {
            api.start_round_id = round_id;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub api: ApiSettings,
    pub database: DatabaseConfig,
}

impl PipelineConfig {
    /// Reads the optional YAML file and layers the process environment and
    /// `overrides` on top of it.
    pub fn load(path: Option<&Path>, overrides: &CliOverrides) -> Result<Self, ConfigError> {
        let yaml = path.map(Self::from_yaml_file).transpose()?;
        Self::resolve(yaml, overrides, |key| std::env::var(key).ok())
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn resolve(
        yaml: Option<PipelineConfig>,
        overrides: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let PipelineConfig { mut api, database } = yaml.unwrap_or_default();

        let database =
            DatabaseConfig::from_cli_or_env_or_yaml(overrides.database_url.clone(), Some(database), &env)?;
        api.apply_env(&env)?;
        overrides.apply(&mut api);
        api.validate()?;

        Ok(Self { api, database })
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, &e.to_string()))
}
