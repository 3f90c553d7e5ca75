// Persistent catalog, watch-list and audit storage

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::diff::{CatalogSnapshot, WatchSnapshot};
use crate::error::StoreError;
use anisync_models::{AuditLogEntry, CatalogEntry, UserWatchEntry, WatchStatus};
use async_trait::async_trait;
use std::collections::HashSet;

/// Datastore seam used by the applier, the import actions and the bulk pipelines.
///
/// Every write is an upsert keyed by external ID, so re-applying the same
/// write converges to the same rows.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn catalog_snapshot(&self) -> Result<CatalogSnapshot, StoreError>;

    /// Watch statuses keyed by external ID; rows whose status was cleared are omitted
    async fn watch_snapshot(&self) -> Result<WatchSnapshot, StoreError>;

    async fn catalog_ids(&self) -> Result<HashSet<i64>, StoreError>;

    async fn get_catalog_entry(&self, id: i64) -> Result<Option<CatalogEntry>, StoreError>;

    async fn get_watch_entry(&self, id: i64) -> Result<Option<UserWatchEntry>, StoreError>;

    /// First catalog ID (lowest) whose romanized or English title equals `name`, ignoring case
    async fn find_by_title(&self, name: &str) -> Result<Option<i64>, StoreError>;

    async fn upsert_catalog_entry(&self, entry: &CatalogEntry) -> Result<(), StoreError>;

    /// Batch upsert in a single transaction
    async fn upsert_catalog_entries(&self, entries: &[CatalogEntry]) -> Result<(), StoreError>;

    /// Set (or clear, with `None`) the watch status of a catalog entry
    async fn upsert_watch_status(&self, id: i64, status: Option<WatchStatus>) -> Result<(), StoreError>;

    async fn upsert_watch_statuses(&self, updates: &[(i64, WatchStatus)]) -> Result<(), StoreError>;

    /// Delete every watch-list row; returns the number removed
    async fn purge_watch_entries(&self) -> Result<u64, StoreError>;

    /// Delete every catalog row and the watch-list rows that reference them
    async fn purge_catalog(&self) -> Result<u64, StoreError>;

    /// Append to the audit log; returns the assigned row ID
    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<i64, StoreError>;

    /// Most recent audit entries, newest first
    async fn recent_audit(&self, limit: u32) -> Result<Vec<AuditLogEntry>, StoreError>;
}
