//! Configuration management for the gavel ingestion engine
//!
//! Configuration is loaded from environment variables or a TOML file
//! and validated before any worker is spawned.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Upstream API configuration
    pub api: ApiConfig,

    /// Worker pool and pacing configuration
    pub ingest: IngestConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Upstream legislative-data API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API key credential attached to every request
    pub api_key: String,

    /// Base URL of the legislative data API
    pub base_url: String,

    /// Client-side throttle (requests per second, per worker)
    pub requests_per_second: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Worker pool and retry behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Number of parallel workers
    pub workers: usize,

    /// Per-request retry budget inside the governor
    pub max_retries: u32,

    /// Consecutive 429s before the circuit breaker opens
    pub cooldown_threshold: u32,

    /// Delay between bills in the primary pass (ms)
    pub pacing_ms: u64,

    /// Delay between bills in the retry pass (ms)
    pub retry_pacing_ms: u64,

    /// Cooldown before the retry pass starts (ms)
    pub retry_cooldown_ms: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("CONGRESS_API_KEY").unwrap_or_default();

        let base_url = std::env::var("GAVEL_API_BASE_URL")
            .unwrap_or_else(|_| String::from("https://api.congress.gov/v3"));

        let requests_per_second = std::env::var("GAVEL_REQUESTS_PER_SECOND")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(2);

        let request_timeout_secs = std::env::var("GAVEL_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let workers = std::env::var("GAVEL_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(4);

        let sqlite_path = std::env::var("GAVEL_SQLITE_PATH")
            .unwrap_or_else(|_| String::from("data/bills.db"))
            .into();

        let log_level = std::env::var("GAVEL_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let log_format = std::env::var("GAVEL_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            api: ApiConfig {
                api_key,
                base_url,
                requests_per_second,
                request_timeout_secs,
            },
            ingest: IngestConfig {
                workers,
                ..IngestConfig::default()
            },
            database: DatabaseConfig { sqlite_path },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.ingest.workers == 0 {
            anyhow::bail!("workers must be greater than 0");
        }

        if self.api.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        if self.ingest.max_retries == 0 {
            anyhow::bail!("max_retries must be greater than 0");
        }

        if self.api.base_url.is_empty() {
            anyhow::bail!("base_url must not be empty");
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_retries: 5,
            cooldown_threshold: 5,
            pacing_ms: 1000,
            retry_pacing_ms: 3000,
            retry_cooldown_ms: 30_000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                api_key: String::new(),
                base_url: String::from("https://api.congress.gov/v3"),
                requests_per_second: 2,
                request_timeout_secs: 30,
            },
            ingest: IngestConfig::default(),
            database: DatabaseConfig {
                sqlite_path: PathBuf::from("data/bills.db"),
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::default();
        config.ingest.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_rps_rejected() {
        let mut config = Config::default();
        config.api.requests_per_second = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_timeout_conversion() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_ingest_defaults_match_engine_contract() {
        let ingest = IngestConfig::default();
        assert_eq!(ingest.max_retries, 5);
        assert_eq!(ingest.cooldown_threshold, 5);
        assert_eq!(ingest.pacing_ms, 1000);
        assert_eq!(ingest.retry_pacing_ms, 3000);
        assert_eq!(ingest.retry_cooldown_ms, 30_000);
    }
}
