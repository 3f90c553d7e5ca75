use crate::anilist::api;
use crate::error::CatalogError;
use crate::traits::{CatalogPage, CatalogSource};
use anisync_config::CatalogConfig;
use anisync_models::CatalogEntry;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct AniListClient {
    client: Arc<Client>,
    endpoint: String,
}

impl AniListClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            endpoint: config.endpoint.clone(),
        })
    }

    /// Client with default settings against a different endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, CatalogError> {
        let config = CatalogConfig {
            endpoint: endpoint.into(),
            ..CatalogConfig::default()
        };
        Self::new(&config)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CatalogSource for AniListClient {
    fn source_name(&self) -> &str {
        "anilist"
    }

    async fn fetch_entry(&self, id: i64) -> Result<Option<CatalogEntry>, CatalogError> {
        debug!(external_id = id, "Fetching catalog entry");
        api::fetch_media(&self.client, &self.endpoint, id).await
    }

    async fn fetch_entries(&self, ids: &[i64]) -> Result<Vec<CatalogEntry>, CatalogError> {
        debug!(count = ids.len(), "Fetching catalog entries by ID");
        api::fetch_media_by_ids(&self.client, &self.endpoint, ids).await
    }

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<CatalogPage, CatalogError> {
        debug!(page, per_page, "Fetching catalog page");
        api::fetch_media_page(&self.client, &self.endpoint, page, per_page).await
    }
}
