pub mod bulk;
pub mod clear;
pub mod config;
pub mod import;
pub mod logs;
pub mod progress;
pub mod prompts;
pub mod smart_sync;
pub mod status;

use anisync_catalog::AniListClient;
use anisync_config::{Config, PathManager};
use anisync_core::{CatalogStore, SqliteStore};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Config file to use: the --config override or the default location
pub fn config_file(paths: &PathManager, override_path: Option<&Path>) -> PathBuf {
    override_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.config_file())
}

pub fn load_config(paths: &PathManager, override_path: Option<&Path>) -> Result<Config> {
    let path = config_file(paths, override_path);
    let config = Config::load_or_default(&path)
        .map_err(|e| eyre!("Failed to load config from {}: {}", path.display(), e))?;
    config
        .validate()
        .map_err(|e| eyre!("Invalid configuration in {}: {}", path.display(), e))?;
    Ok(config)
}

/// Everything a command needs to touch the library
pub struct AppContext {
    pub paths: PathManager,
    pub config: Config,
    store: Arc<SqliteStore>,
}

impl AppContext {
    pub async fn open(config_path: Option<PathBuf>) -> Result<Self> {
        let paths = PathManager::default();
        let config = load_config(&paths, config_path.as_deref())?;

        let db_path = config.database_path(&paths);
        tracing::debug!(path = %db_path.display(), "Opening database");
        let store = SqliteStore::open(&db_path)
            .await
            .map_err(|e| eyre!("Failed to open database at {}: {}", db_path.display(), e))?;

        Ok(Self {
            paths,
            config,
            store: Arc::new(store),
        })
    }

    pub fn store(&self) -> Arc<dyn CatalogStore> {
        self.store.clone()
    }

    pub fn catalog_client(&self) -> Result<AniListClient> {
        AniListClient::new(&self.config.catalog).map_err(|e| eyre!("Failed to create catalog client: {}", e))
    }

    /// Flush WAL and release the pool before the process exits
    pub async fn close(self) {
        self.store.close().await;
    }
}
