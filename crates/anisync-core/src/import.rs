// Import-driven library actions: scan, smart sync and manual status edits

use crate::diff::{compute_diff, resolve_record_id};
use crate::error::{ImportError, StoreError};
use crate::identity::extract_external_id;
use crate::status::known_status;
use crate::store::CatalogStore;
use anisync_config::ImportConfig;
use anisync_models::{AuditEvent, AuditLogEntry, ChangeRecord, ImportDocument, WatchStatus};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SMART_SYNC_CHUNK: usize = 50;
const SMART_SYNC_LOG_LINES: usize = 50;

/// Import record that resolved to no catalog ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedRecord {
    pub category: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub file_name: String,
    pub changes: Vec<ChangeRecord>,
    pub unresolved: Vec<UnresolvedRecord>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SmartSyncReport {
    /// Statuses written
    pub updated: usize,
    /// Resolved IDs that have no catalog row yet, left untouched
    pub not_in_catalog: Vec<i64>,
    pub unmatched: Vec<String>,
    pub skipped_categories: Vec<String>,
    pub logs: Vec<String>,
}

/// Parse an export file's contents
pub fn parse_import_document(bytes: &[u8]) -> Result<ImportDocument, ImportError> {
    serde_json::from_slice(bytes).map_err(|e| ImportError::MalformedImportDocument(e.to_string()))
}

/// Read and parse an export file, refusing files over `max_bytes`
pub fn read_import_file(path: &Path, max_bytes: u64) -> Result<ImportDocument, ImportError> {
    let size = std::fs::metadata(path)?.len();
    if size > max_bytes {
        return Err(ImportError::FileTooLarge {
            size,
            limit: max_bytes,
        });
    }
    let bytes = std::fs::read(path)?;
    parse_import_document(&bytes)
}

pub struct ImportActions {
    store: Arc<dyn CatalogStore>,
    max_file_size_bytes: u64,
}

impl ImportActions {
    pub fn new(store: Arc<dyn CatalogStore>, config: &ImportConfig) -> Self {
        Self {
            store,
            max_file_size_bytes: config.max_file_size_bytes,
        }
    }

    pub async fn scan_file(&self, path: &Path) -> Result<ScanReport, ImportError> {
        let document = read_import_file(path, self.max_file_size_bytes)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.scan_document(&file_name, document).await
    }

    pub async fn scan_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<ScanReport, ImportError> {
        let size = bytes.len() as u64;
        if size > self.max_file_size_bytes {
            return Err(ImportError::FileTooLarge {
                size,
                limit: self.max_file_size_bytes,
            });
        }
        let document = parse_import_document(bytes)?;
        self.scan_document(file_name, document).await
    }

    /// Resolve titles, reconcile against the current library and audit the scan.
    /// Nothing is written besides the `IMPORT_SCAN` audit entry.
    pub async fn scan_document(
        &self,
        file_name: &str,
        mut document: ImportDocument,
    ) -> Result<ScanReport, ImportError> {
        let unresolved = self.resolve_titles(&mut document).await?;

        let catalog = self.store.catalog_snapshot().await?;
        let watch = self.store.watch_snapshot().await?;
        let changes = compute_diff(&document, &catalog, &watch);

        let description = format!("Scanned {}. Found {} changes.", file_name, changes.len());
        info!("{}", description);
        self.store
            .append_audit(&AuditLogEntry::new(
                AuditEvent::ImportScan,
                description,
                json!({ "diff_count": changes.len() }),
            ))
            .await?;

        Ok(ScanReport {
            file_name: file_name.to_string(),
            changes,
            unresolved,
        })
    }

    /// Fill `resolved_id` by title lookup for records without a usable permalink
    pub async fn resolve_titles(
        &self,
        document: &mut ImportDocument,
    ) -> Result<Vec<UnresolvedRecord>, StoreError> {
        let mut unresolved = Vec::new();

        for category in &mut document.categories {
            for record in &mut category.records {
                if extract_external_id(record.al.as_deref()).is_some() {
                    continue;
                }
                record.resolved_id = self.store.find_by_title(&record.name).await?;
                match record.resolved_id {
                    Some(id) => debug!("Matched \"{}\" by title to {}", record.name, id),
                    None => {
                        info!("Unresolved import record: \"{}\" ({})", record.name, category.label);
                        unresolved.push(UnresolvedRecord {
                            category: category.label.clone(),
                            name: record.name.clone(),
                        });
                    }
                }
            }
        }

        Ok(unresolved)
    }

    /// Status-only reconciliation: every resolvable record under a known
    /// category gets that category's status, later occurrences overwriting
    /// earlier ones. Titles missing from the catalog are reported, not created.
    pub async fn smart_sync(&self, document: &ImportDocument) -> Result<SmartSyncReport, ImportError> {
        info!("Starting smart sync");
        let mut report = SmartSyncReport::default();
        let mut updates: Vec<(i64, WatchStatus)> = Vec::new();

        for category in &document.categories {
            let Some(status) = known_status(&category.label) else {
                debug!("Skipping unknown category {:?}", category.label);
                report.skipped_categories.push(category.label.clone());
                continue;
            };

            for record in &category.records {
                if let Some(id) = resolve_record_id(record) {
                    updates.push((id, status));
                    continue;
                }
                match self.store.find_by_title(&record.name).await? {
                    Some(id) => {
                        updates.push((id, status));
                        report.logs.push(format!("Matched \"{}\" by title", record.name));
                    }
                    None => {
                        report.logs.push(format!("Could not find \"{}\" in database", record.name));
                        report.unmatched.push(record.name.clone());
                    }
                }
            }
        }

        let known: HashSet<i64> = self.store.catalog_ids().await?;
        let (present, missing): (Vec<_>, Vec<_>) = updates.into_iter().partition(|(id, _)| known.contains(id));
        for (id, _) in &missing {
            report.logs.push(format!("ID {} is not in the catalog", id));
        }
        report.not_in_catalog = missing.into_iter().map(|(id, _)| id).collect();

        for chunk in present.chunks(SMART_SYNC_CHUNK) {
            self.store.upsert_watch_statuses(chunk).await?;
        }
        report.updated = present.len();

        let description = format!("Smart sync completed: {} items updated.", report.updated);
        info!("{}", description);
        if !report.unmatched.is_empty() {
            warn!("{} import records could not be matched", report.unmatched.len());
        }
        let logs: Vec<&String> = report.logs.iter().take(SMART_SYNC_LOG_LINES).collect();
        self.store
            .append_audit(&AuditLogEntry::new(
                AuditEvent::SmartSync,
                description,
                json!({ "matched": report.updated, "logs": logs }),
            ))
            .await?;

        Ok(report)
    }

    pub async fn set_status(&self, id: i64, status: WatchStatus) -> Result<(), ImportError> {
        self.write_status(id, Some(status), format!("Set status of ID {} to {}", id, status))
            .await
    }

    /// Clear the watch status; the catalog entry stays
    pub async fn remove_from_library(&self, id: i64) -> Result<(), ImportError> {
        self.write_status(id, None, format!("Removed ID {} from library", id))
            .await
    }

    async fn write_status(
        &self,
        id: i64,
        status: Option<WatchStatus>,
        description: String,
    ) -> Result<(), ImportError> {
        if self.store.get_catalog_entry(id).await?.is_none() {
            return Err(ImportError::NotInCatalog(id));
        }
        self.store.upsert_watch_status(id, status).await?;

        info!("{}", description);
        self.store
            .append_audit(&AuditLogEntry::new(
                AuditEvent::StatusUpdate,
                description,
                json!({ "id": id, "status": status }),
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::testing::entry;
    use anisync_models::{CatalogEntry, ChangeKind};

    async fn setup() -> (Arc<SqliteStore>, ImportActions) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        store
            .upsert_catalog_entries(&[
                entry(1, "Cowboy Bebop"),
                CatalogEntry {
                    title_english: Some("Attack on Titan".to_string()),
                    ..entry(16498, "Shingeki no Kyojin")
                },
                entry(457, "Mushishi"),
            ])
            .await
            .unwrap();
        store.upsert_watch_status(1, Some(WatchStatus::Planning)).await.unwrap();
        let actions = ImportActions::new(store.clone(), &ImportConfig::default());
        (store, actions)
    }

    const EXPORT: &str = r#"{
        "Completed": [
            {"name": "Cowboy Bebop", "al": "https://anilist.co/anime/1/cowboy-bebop"},
            {"name": "attack on titan", "al": null},
            {"name": "Some Unknown Show"}
        ],
        "Planning": [
            {"name": "Brand New", "al": "https://anilist.co/anime/999/"}
        ]
    }"#;

    #[tokio::test]
    async fn test_scan_reports_changes_and_unresolved() {
        let (store, actions) = setup().await;

        let report = actions.scan_bytes("export.json", EXPORT.as_bytes()).await.unwrap();

        assert_eq!(report.changes.len(), 2);
        assert_eq!(report.changes[0].external_id, 1);
        assert_eq!(report.changes[0].kind, ChangeKind::StatusChange);
        assert_eq!(report.changes[1].external_id, 999);
        assert_eq!(report.changes[1].kind, ChangeKind::New);
        assert_eq!(
            report.unresolved,
            vec![UnresolvedRecord {
                category: "Completed".to_string(),
                name: "Some Unknown Show".to_string(),
            }]
        );

        let audit = store.recent_audit(5).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].event, AuditEvent::ImportScan);
        assert_eq!(audit[0].description, "Scanned export.json. Found 2 changes.");
        assert_eq!(audit[0].meta, json!({ "diff_count": 2 }));
        // Scanning never writes library rows
        assert_eq!(store.watch_snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_name_resolved_record_can_change_status() {
        let (store, actions) = setup().await;
        store.upsert_watch_status(16498, Some(WatchStatus::Dropped)).await.unwrap();

        let report = actions.scan_bytes("export.json", EXPORT.as_bytes()).await.unwrap();
        let titan = report.changes.iter().find(|c| c.external_id == 16498).unwrap();
        assert_eq!(titan.kind, ChangeKind::StatusChange);
        assert_eq!(titan.title, "Attack on Titan");
        assert_eq!(titan.changes, vec!["Status: DROPPED -> COMPLETED".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_document_fails_before_reconciliation() {
        let (store, actions) = setup().await;

        let err = actions.scan_bytes("bad.json", b"{\"Completed\": 5}").await.unwrap_err();
        assert!(matches!(err, ImportError::MalformedImportDocument(_)));
        let err = actions.scan_bytes("bad.json", b"not json").await.unwrap_err();
        assert!(matches!(err, ImportError::MalformedImportDocument(_)));

        assert!(store.recent_audit(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_size_limit() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let actions = ImportActions::new(store, &ImportConfig { max_file_size_bytes: 8 });

        let err = actions.scan_bytes("big.json", EXPORT.as_bytes()).await.unwrap_err();
        assert!(matches!(err, ImportError::FileTooLarge { limit: 8, .. }));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.json");
        std::fs::write(&path, EXPORT).unwrap();
        let err = actions.scan_file(&path).await.unwrap_err();
        assert!(matches!(err, ImportError::FileTooLarge { limit: 8, .. }));
    }

    #[tokio::test]
    async fn test_scan_file_uses_file_name() {
        let (store, actions) = setup().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my-export.json");
        std::fs::write(&path, "{}").unwrap();

        let report = actions.scan_file(&path).await.unwrap();
        assert!(report.changes.is_empty());
        assert_eq!(report.file_name, "my-export.json");
        let audit = store.recent_audit(1).await.unwrap();
        assert_eq!(audit[0].description, "Scanned my-export.json. Found 0 changes.");
    }

    #[tokio::test]
    async fn test_smart_sync() {
        let (store, actions) = setup().await;
        let document = parse_import_document(
            br#"{
                "Dropped": [
                    {"name": "Cowboy Bebop", "al": "https://anilist.co/anime/1/"},
                    {"name": "Shingeki no Kyojin"},
                    {"name": "Nowhere"}
                ],
                "Watching": [
                    {"name": "Mushishi", "al": "https://anilist.co/anime/457/"}
                ],
                "Completed": [
                    {"name": "Not Scraped", "al": "https://anilist.co/anime/31240/"}
                ]
            }"#,
        )
        .unwrap();

        let report = actions.smart_sync(&document).await.unwrap();

        assert_eq!(report.updated, 2);
        assert_eq!(report.not_in_catalog, vec![31240]);
        assert_eq!(report.unmatched, vec!["Nowhere".to_string()]);
        assert_eq!(report.skipped_categories, vec!["Watching".to_string()]);
        assert!(report.logs.contains(&"Matched \"Shingeki no Kyojin\" by title".to_string()));

        let watch = store.watch_snapshot().await.unwrap();
        assert_eq!(watch[&1], WatchStatus::Dropped);
        assert_eq!(watch[&16498], WatchStatus::Dropped);
        assert!(!watch.contains_key(&457));
        assert!(store.get_catalog_entry(31240).await.unwrap().is_none());

        let audit = store.recent_audit(1).await.unwrap();
        assert_eq!(audit[0].event, AuditEvent::SmartSync);
        assert_eq!(audit[0].description, "Smart sync completed: 2 items updated.");
        assert_eq!(audit[0].meta["matched"], 2);
    }

    #[tokio::test]
    async fn test_smart_sync_later_category_overwrites() {
        let (store, actions) = setup().await;
        let document = parse_import_document(
            br#"{
                "Planning": [{"name": "x", "al": "https://anilist.co/anime/457/"}],
                "Completed": [{"name": "x", "al": "https://anilist.co/anime/457/"}]
            }"#,
        )
        .unwrap();

        actions.smart_sync(&document).await.unwrap();
        assert_eq!(store.watch_snapshot().await.unwrap()[&457], WatchStatus::Completed);
    }

    #[tokio::test]
    async fn test_set_and_remove_status() {
        let (store, actions) = setup().await;

        actions.set_status(457, WatchStatus::OnHold).await.unwrap();
        assert_eq!(store.watch_snapshot().await.unwrap()[&457], WatchStatus::OnHold);

        actions.remove_from_library(457).await.unwrap();
        assert!(!store.watch_snapshot().await.unwrap().contains_key(&457));
        assert!(store.get_catalog_entry(457).await.unwrap().is_some());

        let audit = store.recent_audit(5).await.unwrap();
        assert_eq!(audit.len(), 2);
        assert!(audit.iter().all(|a| a.event == AuditEvent::StatusUpdate));
        assert_eq!(audit[0].description, "Removed ID 457 from library");
        assert_eq!(audit[1].meta, json!({ "id": 457, "status": "ON_HOLD" }));

        let err = actions.set_status(12345, WatchStatus::Completed).await.unwrap_err();
        assert!(matches!(err, ImportError::NotInCatalog(12345)));
    }
}
