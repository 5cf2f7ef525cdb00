//! Configuration types for the monitor bulk editor

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub bulk: BulkConfig,
    /// Location of the credentials profile store (defaults to `~/.mcd/profiles.ini`)
    #[serde(default)]
    pub profiles_path: Option<PathBuf>,
}

/// Remote GraphQL endpoint and request policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout: default_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Exponential backoff policy for transient failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based): base doubled per retry, capped
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Paging and lookup sizes for monitor listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_uuid_chunk_size")]
    pub uuid_chunk_size: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            uuid_chunk_size: default_uuid_chunk_size(),
        }
    }
}

/// Batch processing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Monitors updated at once; 1 keeps the batch strictly sequential
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.getmontecarlo.com/graphql".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(8)
}

fn default_page_size() -> usize {
    100
}

fn default_uuid_chunk_size() -> usize {
    50
}

fn default_concurrency() -> usize {
    1
}

impl Config {
    /// Reject settings that would stall paging or batching
    pub fn validate(&self) -> crate::Result<()> {
        if self.repository.page_size == 0 {
            return Err(crate::BulkEditError::Config(
                "repository.page_size must be at least 1".to_string(),
            ));
        }
        if self.repository.uuid_chunk_size == 0 {
            return Err(crate::BulkEditError::Config(
                "repository.uuid_chunk_size must be at least 1".to_string(),
            ));
        }
        if self.bulk.concurrency == 0 {
            return Err(crate::BulkEditError::Config(
                "bulk.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::BulkEditError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
