use crate::error::{AppError, Result};
use crate::retry::{PollSpec, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const CONFIG_DIR_PREFIX: &str = "sharepoint-workbook";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub graph: GraphConfig,
    pub sharepoint: SharePointConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GraphConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl GraphConfig {
    pub fn token_url(&self) -> String {
        format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            self.tenant_id
        )
    }
}

fn default_base_url() -> String {
    "https://graph.microsoft.com".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SharePointConfig {
    /// Host name, e.g. `contoso.sharepoint.com`
    pub domain: String,
    /// Server-relative site path, e.g. `/sites/Finance`
    pub site: String,
    /// Document library name, e.g. `Documents`
    pub drive: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_seconds: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_seconds: 1.0,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy> {
        let base_backoff = seconds("retry.base_backoff_seconds", self.base_backoff_seconds)?;
        let policy = RetryPolicy::new(self.max_attempts, base_backoff);
        policy.validate()?;
        Ok(policy)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PollConfig {
    pub timeout_seconds: f64,
    pub poll_interval_seconds: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60.0,
            poll_interval_seconds: 3.0,
        }
    }
}

impl PollConfig {
    pub fn spec(&self) -> Result<PollSpec> {
        PollSpec::new(
            seconds("poll.timeout_seconds", self.timeout_seconds)?,
            seconds("poll.poll_interval_seconds", self.poll_interval_seconds)?,
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct UploadConfig {
    pub chunk_rows: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { chunk_rows: 500 }
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::Config(format!(
            "{} must be a positive number of seconds, got {}",
            field, value
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|e| AppError::Config(format!("{} is out of range: {}", field, e)))
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file()?;

        if !config_path.exists() {
            return Err(AppError::Config(format!(
                "Config file not found at {:?}. Please create one.",
                config_path
            )));
        }

        let contents = fs::read_to_string(&config_path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.graph.tenant_id.is_empty()
            || self.graph.client_id.is_empty()
            || self.graph.client_secret.is_empty()
        {
            return Err(AppError::Config(
                "Graph tenant_id, client_id and client_secret must be set in config file"
                    .to_string(),
            ));
        }

        if self.sharepoint.domain.is_empty()
            || self.sharepoint.site.is_empty()
            || self.sharepoint.drive.is_empty()
        {
            return Err(AppError::Config(
                "SharePoint domain, site and drive must be set in config file".to_string(),
            ));
        }

        if self.upload.chunk_rows == 0 {
            return Err(AppError::Config(
                "upload.chunk_rows must be at least 1".to_string(),
            ));
        }

        self.retry.policy()?;
        self.poll.spec()?;
        Ok(())
    }

    fn xdg_dirs() -> xdg::BaseDirectories {
        xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        let xdg_dirs = Self::xdg_dirs();
        xdg_dirs
            .place_config_file("config.toml")
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))
    }

    /// Get the cache directory path, used as the default download location
    pub fn cache_dir() -> Result<PathBuf> {
        let xdg = Self::xdg_dirs();
        xdg.get_cache_home()
            .ok_or_else(|| AppError::Config("Failed to determine cache directory".to_string()))
    }
}
