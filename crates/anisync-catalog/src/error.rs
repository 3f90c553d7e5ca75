use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP 429 from the catalog API
    #[error("Rate limited by catalog API (429)")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Catalog API returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Catalog API reported errors: {0}")]
    Graphql(String),

    #[error("Unexpected catalog response: {0}")]
    Decode(String),
}

impl CatalogError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CatalogError::RateLimited { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::Http { status: 404, .. })
    }
}
