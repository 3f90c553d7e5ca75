// Persisting reconciled changes

use crate::error::{ApplyError, StoreError};
use crate::store::CatalogStore;
use anisync_catalog::CatalogSource;
use anisync_models::{AuditEvent, AuditLogEntry, ChangeKind, ChangeRecord};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// One failed record in an [`ApplySummary`]
#[derive(Debug, Clone, Serialize)]
pub struct ApplyFailure {
    pub external_id: i64,
    pub title: String,
    pub error: String,
}

/// Outcome of applying a batch of change records
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplySummary {
    pub applied: usize,
    pub failed: usize,
    pub errors: Vec<ApplyFailure>,
}

/// Serializes writers per external ID so concurrent callers never interleave
/// the catalog and watch-list upserts of the same title
#[derive(Default)]
struct IdLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl IdLocks {
    async fn lock_for(&self, id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(id).or_default().clone()
    }

    /// Drop the entry for `id` once no other caller holds or awaits it.
    /// `lock` must already be unlocked.
    async fn release(&self, id: i64, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One reference in the map, one in `lock`
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&id);
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

/// Applies change records: hydrates new titles from the catalog, upserts
/// catalog and watch-list rows, and audits every attempt
pub struct ChangeApplier {
    store: Arc<dyn CatalogStore>,
    source: Arc<dyn CatalogSource>,
    locks: IdLocks,
}

impl ChangeApplier {
    pub fn new(store: Arc<dyn CatalogStore>, source: Arc<dyn CatalogSource>) -> Self {
        Self {
            store,
            source,
            locks: IdLocks::default(),
        }
    }

    /// Apply one change record and append exactly one audit entry for it.
    ///
    /// Upserts only, so applying the same record again converges to the same rows.
    /// A `New` record whose catalog lookup fails leaves the datastore untouched.
    pub async fn apply_change(&self, record: &ChangeRecord) -> Result<(), ApplyError> {
        let lock = self.locks.lock_for(record.external_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.write_and_audit(record).await
        };
        self.locks.release(record.external_id, lock).await;
        result
    }

    async fn write_and_audit(&self, record: &ChangeRecord) -> Result<(), ApplyError> {
        let result = self.write_change(record).await;

        let audit = match &result {
            Ok(()) => {
                info!(
                    "Applied {} for ID {} ({})",
                    record.kind, record.external_id, record.title
                );
                AuditLogEntry::new(
                    AuditEvent::ApplyChange,
                    format!(
                        "Applied {} for ID {} ({})",
                        record.kind, record.external_id, record.title
                    ),
                    serde_json::to_value(record).unwrap_or_else(|_| json!({ "id": record.external_id })),
                )
            }
            Err(e) => {
                error!("Failed to apply change for {}: {}", record.external_id, e);
                AuditLogEntry::new(
                    AuditEvent::Error,
                    format!("Failed to apply change for {}", record.external_id),
                    json!({ "error": e.to_string(), "kind": record.kind }),
                )
            }
        };

        if let Err(e) = self.store.append_audit(&audit).await {
            warn!("Failed to write audit entry for {}: {}", record.external_id, e);
        }

        result
    }

    async fn write_change(&self, record: &ChangeRecord) -> Result<(), ApplyError> {
        let id = record.external_id;
        let write_failed = |source: StoreError| ApplyError::DatastoreWriteFailed { id, source };

        match record.kind {
            ChangeKind::New => {
                let entry = self
                    .source
                    .fetch_entry(id)
                    .await
                    .map_err(|e| ApplyError::fetch(id, e))?
                    .ok_or_else(|| ApplyError::CatalogFetchFailed {
                        id,
                        reason: format!("no entry returned by {}", self.source.source_name()),
                    })?;

                self.store.upsert_catalog_entry(&entry).await.map_err(write_failed)?;
                self.store
                    .upsert_watch_status(id, Some(record.target_status))
                    .await
                    .map_err(write_failed)?;
            }
            ChangeKind::StatusChange => {
                self.store
                    .upsert_watch_status(id, Some(record.target_status))
                    .await
                    .map_err(write_failed)?;
            }
            ChangeKind::Update => {
                if let Some(entry) = &record.payload {
                    self.store.upsert_catalog_entry(entry).await.map_err(write_failed)?;
                }
                self.store
                    .upsert_watch_status(id, Some(record.target_status))
                    .await
                    .map_err(write_failed)?;
            }
            ChangeKind::NoChange => {
                debug!("Nothing to apply for ID {}", id);
            }
        }

        Ok(())
    }

    /// Apply records one after another; a failure never stops the rest of the batch
    pub async fn apply_all(&self, records: &[ChangeRecord]) -> ApplySummary {
        let mut summary = ApplySummary::default();

        for record in records {
            match self.apply_change(record).await {
                Ok(()) => summary.applied += 1,
                Err(e) => {
                    summary.failed += 1;
                    summary.errors.push(ApplyFailure {
                        external_id: e.external_id(),
                        title: record.title.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Applied {} of {} changes ({} failed)",
            summary.applied,
            records.len(),
            summary.failed
        );
        summary
    }
}
