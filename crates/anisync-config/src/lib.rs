pub mod config;
pub mod paths;

pub use config::{BulkConfig, CatalogConfig, Config, DatabaseConfig, ImportConfig, DEFAULT_CATALOG_ENDPOINT, MAX_PAGE_SIZE};
pub use paths::{PathManager, container_base_path};
