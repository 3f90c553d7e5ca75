use anisync_catalog::CatalogError;
use thiserror::Error;

/// Errors from the persistent datastore
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to encode or decode column {column}: {source}")]
    Json {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value in column {column}: {value}")]
    InvalidValue { column: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure applying one change record; never aborts the rest of a batch
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Catalog fetch failed for ID {id}: {reason}")]
    CatalogFetchFailed { id: i64, reason: String },

    #[error("Datastore write failed for ID {id}: {source}")]
    DatastoreWriteFailed {
        id: i64,
        #[source]
        source: StoreError,
    },
}

impl ApplyError {
    pub fn external_id(&self) -> i64 {
        match self {
            ApplyError::CatalogFetchFailed { id, .. } => *id,
            ApplyError::DatastoreWriteFailed { id, .. } => *id,
        }
    }

    pub(crate) fn fetch(id: i64, err: CatalogError) -> Self {
        ApplyError::CatalogFetchFailed {
            id,
            reason: err.to_string(),
        }
    }
}

/// Errors from the import-driven actions (scan, smart sync, manual status edits)
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Malformed import document: {0}")]
    MalformedImportDocument(String),

    #[error("Import file is {size} bytes, larger than the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("ID {0} is not in the catalog")]
    NotInCatalog(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that stop a bulk pipeline before it starts or while persisting
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Raw page cache error: {0}")]
    Cache(#[from] std::io::Error),

    #[error(transparent)]
    Import(#[from] ImportError),
}
