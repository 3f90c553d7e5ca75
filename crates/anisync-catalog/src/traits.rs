use async_trait::async_trait;
use anisync_models::CatalogEntry;
use crate::error::CatalogError;

/// One page of the paginated catalog listing
#[derive(Debug, Clone)]
pub struct CatalogPage {
    pub page: u32,
    pub entries: Vec<CatalogEntry>,
    /// Media list exactly as the API returned it, kept for the raw page cache
    pub raw: serde_json::Value,
    pub has_next_page: bool,
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn source_name(&self) -> &str;

    /// Single-item lookup; `Ok(None)` when the catalog has no such ID
    async fn fetch_entry(&self, id: i64) -> Result<Option<CatalogEntry>, CatalogError>;

    /// Batch lookup by ID list; IDs the catalog does not know are simply absent
    async fn fetch_entries(&self, ids: &[i64]) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Page of the full listing, ordered by ID
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<CatalogPage, CatalogError>;
}
