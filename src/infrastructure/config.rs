//! Configuration infrastructure
//!
//! Configuration is a single JSON document split into sections: storage,
//! HTTP politeness, assessor endpoints, the crawl itself, and logging. Every
//! section falls back to its defaults, so files written by older builds keep
//! loading after new fields appear.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

use crate::domain::candidates::SearchKeyRange;
use crate::domain::parcel::SearchKey;
use crate::infrastructure::http_client::HttpClientConfig;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpClientConfig,
    pub endpoints: EndpointConfig,
    pub crawl: CrawlConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; parent directories are created on open
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::DATABASE_FILE),
            max_connections: defaults::DATABASE_MAX_CONNECTIONS,
        }
    }
}

/// Assessor endpoints and the fixed form values they expect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub search_url: String,
    pub detail_url: String,
    /// Sent as `field` to both endpoints
    pub search_field: String,
    /// Sent as `qtype` to the detail endpoint
    pub detail_qtype: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            search_url: assessor::SEARCH_URL.to_string(),
            detail_url: assessor::DETAIL_URL.to_string(),
            search_field: assessor::SEARCH_FIELD.to_string(),
            detail_qtype: assessor::DETAIL_QTYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// First search key visited, inclusive
    pub start_key: u32,
    /// Last search key visited, inclusive
    pub end_key: u32,
    /// Skip keys whose remote calls fail instead of stopping the run
    pub continue_on_error: bool,
    /// Keys between progress lines; 0 disables them
    pub progress_interval_keys: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_key: SearchKey::MIN.value(),
            end_key: SearchKey::MAX.value(),
            continue_on_error: false,
            progress_interval_keys: defaults::PROGRESS_INTERVAL_KEYS,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Log directory; defaults to `logs/` next to the executable
    pub directory: Option<PathBuf>,
    pub file_name: String,
    /// Per-target levels layered over `level`, e.g. `"sqlx": "warn"`
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            directory: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            module_filters: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Reject settings the crawler cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.key_range()?;

        if self.http.max_requests_per_second == 0 {
            bail!("http.max_requests_per_second must be greater than 0");
        }
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be greater than 0");
        }

        for (name, value) in [
            ("endpoints.search_url", &self.endpoints.search_url),
            ("endpoints.detail_url", &self.endpoints.detail_url),
        ] {
            if value.trim().is_empty() {
                bail!("{} must not be empty", name);
            }
            url::Url::parse(value).with_context(|| format!("{} is not a valid URL: {}", name, value))?;
        }

        Ok(())
    }

    /// Inclusive key range configured under `crawl`.
    pub fn key_range(&self) -> Result<SearchKeyRange> {
        let start = SearchKey::try_from(self.crawl.start_key).context("crawl.start_key")?;
        let end = SearchKey::try_from(self.crawl.end_key).context("crawl.end_key")?;
        if start > end {
            bail!("crawl.start_key {} is after crawl.end_key {}", start, end);
        }
        Ok(SearchKeyRange::new(start, end))
    }
}

/// How [`ConfigManager::load_or_create`] obtained the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from an existing file
    Loaded,
    /// No file existed; defaults were written to it
    CreatedDefault,
}

/// Configuration manager for loading and saving configuration
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Manager for the default config file in the user config directory
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        let (config, _) = self.load_or_create().await?;
        Ok(config)
    }

    /// Like [`Self::load_config`], also reporting where the configuration came from.
    ///
    /// Nothing is logged here; the binary loads configuration before the
    /// subscriber exists and reports the source once logging is up.
    pub async fn load_or_create(&self) -> Result<(AppConfig, ConfigSource)> {
        if !self.config_path.exists() {
            let default_config = AppConfig::default();
            self.write_config(&default_config).await?;
            return Ok((default_config, ConfigSource::CreatedDefault));
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("Failed to read configuration file {:?}", self.config_path))?;

        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {:?}", self.config_path))?;

        Ok((config, ConfigSource::Loaded))
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        self.write_config(config).await?;
        info!("Configuration saved to: {:?}", self.config_path);
        Ok(())
    }

    async fn write_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")
    }
}

/// Riverside County assessor endpoints
pub mod assessor {
    pub const SEARCH_URL: &str = "https://rivcoview.rivcoacr.org/data/ajaxcalls/db/getSearchResults.php";
    pub const DETAIL_URL: &str = "https://rivcoview.rivcoacr.org/data/ajaxcalls/db/getData.php";
    pub const SEARCH_FIELD: &str = "mv_Location:PIN";
    pub const DETAIL_QTYPE: &str = "assessment_info";
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "parcel-crawler";
    pub const CONFIG_FILE_NAME: &str = "parcel_crawler_config.json";

    pub const DATABASE_FILE: &str = "parcels.db";
    pub const DATABASE_MAX_CONNECTIONS: u32 = 4;

    /// One progress line per this many search keys
    pub const PROGRESS_INTERVAL_KEYS: u64 = 1000;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_NAME: &str = "parcel-crawler.log";
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.key_range().unwrap().len(), 100_000_000);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"crawl": {"start_key": 500}, "http": {"max_retries": 5}}"#).unwrap();

        assert_eq!(config.crawl.start_key, 500);
        assert_eq!(config.crawl.end_key, 99_999_999);
        assert_eq!(config.http.max_retries, 5);
        assert_eq!(config.http.timeout_seconds, 30);
        assert_eq!(config.endpoints, EndpointConfig::default());
        assert_eq!(config.database, DatabaseConfig::default());
    }

    #[test]
    fn validate_rejects_bad_ranges() {
        let mut config = AppConfig::default();
        config.crawl.start_key = 10;
        config.crawl.end_key = 9;
        assert!(config.validate().is_err());

        config.crawl.start_key = 0;
        config.crawl.end_key = 100_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_rate_and_bad_urls() {
        let mut config = AppConfig::default();
        config.http.max_requests_per_second = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.endpoints.detail_url = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.endpoints.search_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn single_key_range() {
        let mut config = AppConfig::default();
        config.crawl.start_key = 42;
        config.crawl.end_key = 42;
        let keys: Vec<u32> = config.key_range().unwrap().map(SearchKey::value).collect();
        assert_eq!(keys, vec![42]);
    }

    #[tokio::test]
    async fn load_creates_default_file_then_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let manager = ConfigManager::with_path(dir.path().join("nested").join("config.json"));

        let created = manager.load_config().await?;
        assert_eq!(created, AppConfig::default());
        assert!(manager.config_path().exists());

        let mut changed = created;
        changed.crawl.continue_on_error = true;
        changed.logging.module_filters.insert("sqlx".to_string(), "warn".to_string());
        manager.save_config(&changed).await?;

        assert_eq!(manager.load_config().await?, changed);
        Ok(())
    }

    #[tokio::test]
    async fn load_or_create_reports_the_source() -> Result<()> {
        let dir = tempdir()?;
        let manager = ConfigManager::with_path(dir.path().join("config.json"));

        let (first, source) = manager.load_or_create().await?;
        assert_eq!(source, ConfigSource::CreatedDefault);
        assert_eq!(first, AppConfig::default());

        let (second, source) = manager.load_or_create().await?;
        assert_eq!(source, ConfigSource::Loaded);
        assert_eq!(second, first);
        Ok(())
    }

    #[tokio::test]
    async fn unparseable_file_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json")?;

        assert!(ConfigManager::with_path(path).load_config().await.is_err());
        Ok(())
    }
}
