use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CATALOG_ENDPOINT: &str = "https://graphql.anilist.co";

/// Largest page the catalog API will serve
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub bulk: BulkConfig,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to `<data_dir>/anisync.db`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,
}

/// Pacing and batching of the bulk catalog pipelines
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BulkConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Pages fetched at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// First backoff after a rate-limit response; doubles on each retry
    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: u64,
    #[serde(default = "default_max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,
    #[serde(default = "default_ingest_batch_size")]
    pub ingest_batch_size: usize,
    #[serde(default = "default_ingest_delay_ms")]
    pub ingest_delay_ms: u64,
    #[serde(default)]
    pub max_pages: Option<u32>,
}

fn default_endpoint() -> String {
    DEFAULT_CATALOG_ENDPOINT.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("anisync/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_file_size_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_concurrency() -> usize {
    2
}

fn default_page_delay_ms() -> u64 {
    1500
}

fn default_rate_limit_backoff_secs() -> u64 {
    15
}

fn default_max_rate_limit_retries() -> u32 {
    5
}

fn default_ingest_batch_size() -> usize {
    50
}

fn default_ingest_delay_ms() -> u64 {
    2000
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size_bytes(),
        }
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            concurrency: default_concurrency(),
            page_delay_ms: default_page_delay_ms(),
            rate_limit_backoff_secs: default_rate_limit_backoff_secs(),
            max_rate_limit_retries: default_max_rate_limit_retries(),
            ingest_batch_size: default_ingest_batch_size(),
            ingest_delay_ms: default_ingest_delay_ms(),
            max_pages: None,
        }
    }
}

impl CatalogConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl BulkConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn ingest_delay(&self) -> Duration {
        Duration::from_millis(self.ingest_delay_ms)
    }

    /// Backoff before retry number `attempt` (1-based) of a rate-limited page
    pub fn rate_limit_backoff(&self, attempt: u32) -> Duration {
        let base = Duration::from_secs(self.rate_limit_backoff_secs);
        base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.catalog.endpoint.trim().is_empty() {
            return Err(anyhow::anyhow!("catalog.endpoint cannot be empty"));
        }
        if self.bulk.page_size == 0 || self.bulk.page_size > MAX_PAGE_SIZE {
            return Err(anyhow::anyhow!(
                "bulk.page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE,
                self.bulk.page_size
            ));
        }
        if self.bulk.concurrency == 0 {
            return Err(anyhow::anyhow!("bulk.concurrency must be at least 1"));
        }
        if self.bulk.ingest_batch_size == 0 || self.bulk.ingest_batch_size > MAX_PAGE_SIZE as usize {
            return Err(anyhow::anyhow!(
                "bulk.ingest_batch_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE,
                self.bulk.ingest_batch_size
            ));
        }
        Ok(())
    }

    /// Database file, honouring the configured override
    pub fn database_path(&self, paths: &crate::PathManager) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| paths.database_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.bulk.page_size = 25;
        config.bulk.max_pages = Some(10);
        config.database.path = Some(PathBuf::from("/tmp/anisync-test.db"));

        config.save_to_file(file.path()).unwrap();

        let loaded = Config::load_from_file(file.path()).unwrap();
        assert_eq!(loaded.bulk.page_size, 25);
        assert_eq!(loaded.bulk.max_pages, Some(10));
        assert_eq!(loaded.bulk.concurrency, 2);
        assert_eq!(loaded.database.path, Some(PathBuf::from("/tmp/anisync-test.db")));
        assert_eq!(loaded.catalog.endpoint, DEFAULT_CATALOG_ENDPOINT);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[bulk]\nconcurrency = 4\n").unwrap();
        assert_eq!(config.bulk.concurrency, 4);
        assert_eq!(config.bulk.page_size, 50);
        assert_eq!(config.bulk.page_delay_ms, 1500);
        assert_eq!(config.import.max_file_size_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.bulk.rate_limit_backoff_secs, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.bulk.page_size = 51;
        assert!(config.validate().is_err());
        config.bulk.page_size = 50;

        config.bulk.concurrency = 0;
        assert!(config.validate().is_err());
        config.bulk.concurrency = 1;

        config.catalog.endpoint = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rate_limit_backoff_doubles() {
        let bulk = BulkConfig::default();
        assert_eq!(bulk.rate_limit_backoff(1), Duration::from_secs(15));
        assert_eq!(bulk.rate_limit_backoff(2), Duration::from_secs(30));
        assert_eq!(bulk.rate_limit_backoff(3), Duration::from_secs(60));
    }
}
