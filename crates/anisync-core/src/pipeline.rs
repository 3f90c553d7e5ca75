// Bulk catalog pipelines: full paginated refresh and first-time ingestion

use crate::cache::RawPageCache;
use crate::error::PipelineError;
use crate::identity::extract_external_id;
use crate::status::normalize_status;
use crate::store::CatalogStore;
use anisync_catalog::{CatalogError, CatalogPage, CatalogSource};
use anisync_config::BulkConfig;
use anisync_models::{AuditEvent, AuditLogEntry, ImportDocument, WatchStatus};
use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Consecutive failed pages after which a full sync gives up
const MAX_CONSECUTIVE_PAGE_FAILURES: u32 = 10;

/// Why a full sync stopped before reaching the last page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum HaltReason {
    RateLimitExhausted { page: u32, attempts: u32 },
    ConsecutiveFailures { page: u32, count: u32 },
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::RateLimitExhausted { page, attempts } => {
                write!(f, "page {} still rate limited after {} attempts", page, attempts)
            }
            HaltReason::ConsecutiveFailures { page, count } => {
                write!(f, "{} consecutive page failures ending at page {}", count, page)
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkSyncReport {
    /// Catalog entries persisted
    pub success: usize,
    /// Pages skipped after a non rate-limit error
    pub failures: usize,
    pub pages_fetched: usize,
    pub rate_limit_hits: u32,
    pub statuses_applied: usize,
    pub start_page: u32,
    pub last_page: Option<u32>,
    pub halted: Option<HaltReason>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub queued: usize,
    pub success: usize,
    pub failures: usize,
    pub rate_limit_hits: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FullSyncOptions {
    /// Start after the highest page in the raw page cache instead of page 1
    pub resume: bool,
    /// Watch statuses to write for matching IDs while pages are persisted
    pub statuses: Option<HashMap<i64, WatchStatus>>,
}

/// Progress notifications for front ends
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    PageSynced { page: u32, items: usize },
    PageFailed { page: u32, error: String },
    RateLimited { page: u32, wait: Duration },
    BatchDone { done: usize, total: usize },
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Watch status per permalink ID across the whole document; later categories
/// overwrite earlier ones and unknown labels map to `Unknown`
pub fn status_map(document: &ImportDocument) -> HashMap<i64, WatchStatus> {
    let mut statuses = HashMap::new();
    for category in &document.categories {
        let status = normalize_status(&category.label);
        for record in &category.records {
            if let Some(id) = extract_external_id(record.al.as_deref()) {
                statuses.insert(id, status);
            }
        }
    }
    statuses
}

/// Deduplicated ingestion queue: permalink IDs in document order, first occurrence wins
pub fn work_queue(document: &ImportDocument) -> Vec<(i64, WatchStatus)> {
    let mut seen = HashSet::new();
    let mut queue = Vec::new();
    for category in &document.categories {
        let status = normalize_status(&category.label);
        for record in &category.records {
            if let Some(id) = extract_external_id(record.al.as_deref()) {
                if seen.insert(id) {
                    queue.push((id, status));
                }
            }
        }
    }
    queue
}

enum PageFailure {
    RateLimitExhausted { attempts: u32 },
    Failed(CatalogError),
}

struct PageOutcome {
    page: u32,
    rate_limit_hits: u32,
    result: Result<CatalogPage, PageFailure>,
}

pub struct BulkSync {
    store: Arc<dyn CatalogStore>,
    source: Arc<dyn CatalogSource>,
    cache: RawPageCache,
    config: BulkConfig,
    progress: Option<ProgressCallback>,
}

impl BulkSync {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        source: Arc<dyn CatalogSource>,
        cache: RawPageCache,
        config: BulkConfig,
    ) -> Self {
        Self {
            store,
            source,
            cache,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    fn notify(&self, event: ProgressEvent) {
        if let Some(callback) = &self.progress {
            callback(event);
        }
    }

    /// Page through the whole catalog and overwrite local rows with it.
    ///
    /// Pages are fetched `concurrency` at a time but persisted one by one in
    /// page order. Rate-limited pages back off exponentially and retry; other
    /// page errors skip the page. The run ends on an empty page or one that
    /// reports no next page.
    pub async fn run_full_sync(&self, options: &FullSyncOptions) -> Result<BulkSyncReport, PipelineError> {
        let start_page = if options.resume {
            self.cache.resume_page()?
        } else {
            1
        };
        let concurrency = self.config.concurrency.max(1) as u32;
        let last_allowed = self
            .config
            .max_pages
            .map(|max| start_page.saturating_add(max).saturating_sub(1));

        let mut report = BulkSyncReport {
            start_page,
            ..BulkSyncReport::default()
        };
        let mut page = start_page;
        let mut consecutive_failures = 0u32;
        let mut finished = false;

        info!("Starting full catalog sync at page {}", start_page);

        while !finished {
            let window_end = match last_allowed {
                Some(last) if page > last => break,
                Some(last) => (page + concurrency - 1).min(last),
                None => page + concurrency - 1,
            };
            let pages: Vec<u32> = (page..=window_end).collect();
            debug!("Fetching pages {} to {}", page, window_end);

            let outcomes = join_all(pages.iter().map(|p| self.fetch_with_backoff(*p))).await;

            for outcome in outcomes {
                report.rate_limit_hits += outcome.rate_limit_hits;
                match outcome.result {
                    Ok(fetched) => {
                        consecutive_failures = 0;
                        if fetched.entries.is_empty() {
                            debug!("Page {} is empty, catalog exhausted", outcome.page);
                            finished = true;
                            break;
                        }
                        match self.persist_page(&fetched, options.statuses.as_ref()).await {
                            Ok(statuses) => {
                                report.success += fetched.entries.len();
                                report.statuses_applied += statuses;
                                report.pages_fetched += 1;
                                report.last_page = Some(outcome.page);
                                info!("Page {} synced ({} items)", outcome.page, fetched.entries.len());
                                self.notify(ProgressEvent::PageSynced {
                                    page: outcome.page,
                                    items: fetched.entries.len(),
                                });
                            }
                            Err(e) => {
                                report.failures += 1;
                                error!("Failed to persist page {}: {}", outcome.page, e);
                                self.notify(ProgressEvent::PageFailed {
                                    page: outcome.page,
                                    error: e.to_string(),
                                });
                            }
                        }
                        if !fetched.has_next_page {
                            finished = true;
                            break;
                        }
                    }
                    Err(PageFailure::RateLimitExhausted { attempts }) => {
                        let reason = HaltReason::RateLimitExhausted {
                            page: outcome.page,
                            attempts,
                        };
                        error!("Halting full sync: {}", reason);
                        report.halted = Some(reason);
                        finished = true;
                        break;
                    }
                    Err(PageFailure::Failed(e)) => {
                        report.failures += 1;
                        consecutive_failures += 1;
                        warn!("Skipping page {}: {}", outcome.page, e);
                        self.notify(ProgressEvent::PageFailed {
                            page: outcome.page,
                            error: e.to_string(),
                        });
                        if consecutive_failures >= MAX_CONSECUTIVE_PAGE_FAILURES {
                            let reason = HaltReason::ConsecutiveFailures {
                                page: outcome.page,
                                count: consecutive_failures,
                            };
                            error!("Halting full sync: {}", reason);
                            report.halted = Some(reason);
                            finished = true;
                            break;
                        }
                    }
                }
            }

            page = window_end + 1;
            if !finished {
                tokio::time::sleep(self.config.page_delay()).await;
            }
        }

        info!(
            "Full sync finished: {} items from {} pages, {} failed pages, {} rate limit hits",
            report.success, report.pages_fetched, report.failures, report.rate_limit_hits
        );

        let description = match &report.halted {
            Some(reason) => format!(
                "Full sync halted after {} items ({} failed pages): {}",
                report.success, report.failures, reason
            ),
            None => format!(
                "Full sync completed: {} items, {} failed pages",
                report.success, report.failures
            ),
        };
        self.audit(AuditEvent::BulkSync, description, &report).await?;

        Ok(report)
    }

    async fn fetch_with_backoff(&self, page: u32) -> PageOutcome {
        let (rate_limit_hits, result) = self
            .retry_rate_limited(&format!("page {}", page), Some(page), || {
                self.source.fetch_page(page, self.config.page_size)
            })
            .await;
        PageOutcome {
            page,
            rate_limit_hits,
            result,
        }
    }

    /// Run a catalog call, backing off exponentially while it is rate limited.
    ///
    /// A server `Retry-After` longer than the backoff wins. Gives up after
    /// `max_rate_limit_retries` retries. Returns the number of 429s seen.
    async fn retry_rate_limited<T, F, Fut>(
        &self,
        what: &str,
        page: Option<u32>,
        mut call: F,
    ) -> (u32, Result<T, PageFailure>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        let mut hits = 0u32;
        loop {
            match call().await {
                Ok(value) => return (hits, Ok(value)),
                Err(CatalogError::RateLimited { retry_after }) => {
                    hits += 1;
                    if hits > self.config.max_rate_limit_retries {
                        return (hits, Err(PageFailure::RateLimitExhausted { attempts: hits }));
                    }
                    let backoff = self.config.rate_limit_backoff(hits);
                    let wait = retry_after.map_or(backoff, |server| server.max(backoff));
                    warn!("Rate limit hit on {}. Cooling down {:?}", what, wait);
                    if let Some(page) = page {
                        self.notify(ProgressEvent::RateLimited { page, wait });
                    }
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return (hits, Err(PageFailure::Failed(e))),
            }
        }
    }

    /// Archive the raw page, upsert its entries and any matching statuses.
    /// Returns the number of statuses written.
    async fn persist_page(
        &self,
        fetched: &CatalogPage,
        statuses: Option<&HashMap<i64, WatchStatus>>,
    ) -> Result<usize, PipelineError> {
        self.store.upsert_catalog_entries(&fetched.entries).await?;

        let updates: Vec<(i64, WatchStatus)> = match statuses {
            Some(map) => fetched
                .entries
                .iter()
                .filter_map(|entry| map.get(&entry.external_id).map(|s| (entry.external_id, *s)))
                .collect(),
            None => Vec::new(),
        };
        self.store.upsert_watch_statuses(&updates).await?;

        // Archived only once stored, so a resume never skips an unsaved page
        if let Err(e) = self.cache.save_page(fetched.page, &fetched.raw) {
            warn!("Failed to cache raw page {}: {}", fetched.page, e);
        }
        Ok(updates.len())
    }

    /// Rebuild the watch list from an export: clear it, then fetch every
    /// permalink ID in batches and upsert catalog row and status per title.
    /// A failed batch counts all of its IDs as failures.
    pub async fn run_ingest(&self, document: &ImportDocument) -> Result<IngestReport, PipelineError> {
        let cleared = self.store.purge_watch_entries().await?;
        info!("Cleared {} watch-list entries", cleared);

        let queue = work_queue(document);
        let mut report = IngestReport {
            queued: queue.len(),
            ..IngestReport::default()
        };
        info!("Ingesting {} unique titles", queue.len());

        let batch_size = self.config.ingest_batch_size.max(1);
        let mut done = 0usize;

        for (index, batch) in queue.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.ingest_delay()).await;
            }
            let ids: Vec<i64> = batch.iter().map(|(id, _)| *id).collect();
            debug!("Fetching batch {} ({} IDs)", index + 1, ids.len());

            let (hits, fetched) = self
                .retry_rate_limited(&format!("batch {}", index + 1), None, || {
                    self.source.fetch_entries(&ids)
                })
                .await;
            report.rate_limit_hits += hits;

            match fetched {
                Ok(entries) => {
                    let wanted: HashMap<i64, WatchStatus> = batch.iter().copied().collect();
                    let mut returned = HashSet::new();

                    for entry in &entries {
                        let Some(status) = wanted.get(&entry.external_id) else {
                            continue;
                        };
                        returned.insert(entry.external_id);

                        if let Err(e) = self.store.upsert_catalog_entry(entry).await {
                            error!("Error upserting catalog entry {}: {}", entry.external_id, e);
                            report.failures += 1;
                            continue;
                        }
                        match self.store.upsert_watch_status(entry.external_id, Some(*status)).await {
                            Ok(()) => report.success += 1,
                            Err(e) => {
                                error!("Error upserting watch status {}: {}", entry.external_id, e);
                                report.failures += 1;
                            }
                        }
                    }

                    let missing: Vec<i64> = ids.iter().copied().filter(|id| !returned.contains(id)).collect();
                    if !missing.is_empty() {
                        warn!("Catalog returned no entry for IDs {:?}", missing);
                        report.failures += missing.len();
                    }
                }
                Err(PageFailure::RateLimitExhausted { attempts }) => {
                    error!("Batch {} still rate limited after {} attempts", index + 1, attempts);
                    report.failures += ids.len();
                }
                Err(PageFailure::Failed(e)) => {
                    error!("Batch failed: {}", e);
                    report.failures += ids.len();
                }
            }

            done += batch.len();
            self.notify(ProgressEvent::BatchDone {
                done,
                total: queue.len(),
            });
        }

        info!("Ingestion finished: {} succeeded, {} failed", report.success, report.failures);
        let description = format!(
            "Ingestion completed: {} succeeded, {} failed of {} queued",
            report.success, report.failures, report.queued
        );
        self.audit(AuditEvent::Ingest, description, &report).await?;

        Ok(report)
    }

    async fn audit<T: Serialize>(
        &self,
        event: AuditEvent,
        description: String,
        report: &T,
    ) -> Result<(), PipelineError> {
        let meta = serde_json::to_value(report).unwrap_or_default();
        self.store
            .append_audit(&AuditLogEntry::new(event, description, meta))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::parse_import_document;
    use crate::store::SqliteStore;
    use crate::testing::FakeSource;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn fast_config(page_size: u32) -> BulkConfig {
        BulkConfig {
            page_size,
            concurrency: 2,
            page_delay_ms: 0,
            rate_limit_backoff_secs: 0,
            max_rate_limit_retries: 3,
            ingest_batch_size: 2,
            ingest_delay_ms: 0,
            max_pages: None,
        }
    }

    struct Harness {
        _dir: TempDir,
        store: Arc<SqliteStore>,
        source: Arc<FakeSource>,
        cache: RawPageCache,
        sync: BulkSync,
    }

    async fn harness(source: FakeSource, config: BulkConfig) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let source = Arc::new(source);
        let cache = RawPageCache::at(dir.path().join("raw")).unwrap();
        let sync = BulkSync::new(store.clone(), source.clone(), cache.clone(), config);
        Harness {
            _dir: dir,
            store,
            source,
            cache,
            sync,
        }
    }

    fn export(json: &str) -> ImportDocument {
        parse_import_document(json.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_full_sync_pages_through_catalog() {
        let h = harness(FakeSource::numbered(5), fast_config(2)).await;

        let report = h.sync.run_full_sync(&FullSyncOptions::default()).await.unwrap();

        assert_eq!(report.success, 5);
        assert_eq!(report.pages_fetched, 3);
        assert_eq!(report.failures, 0);
        assert_eq!(report.last_page, Some(3));
        assert!(report.halted.is_none());
        assert_eq!(h.store.catalog_ids().await.unwrap().len(), 5);
        assert_eq!(h.cache.cached_pages().unwrap(), vec![1, 2, 3]);

        let audit = h.store.recent_audit(1).await.unwrap();
        assert_eq!(audit[0].event, AuditEvent::BulkSync);
        assert_eq!(audit[0].meta["success"], 5);
    }

    #[tokio::test]
    async fn test_full_sync_applies_statuses_last_category_wins() {
        let h = harness(FakeSource::numbered(4), fast_config(50)).await;
        let document = export(
            r#"{
                "Planning": [{"name": "a", "al": "https://anilist.co/anime/2/"}],
                "Completed": [{"name": "a", "al": "https://anilist.co/anime/2/"}],
                "Mystery": [{"name": "b", "al": "https://anilist.co/anime/3/"}],
                "Dropped": [{"name": "c", "al": "https://anilist.co/anime/77/"}]
            }"#,
        );
        let options = FullSyncOptions {
            resume: false,
            statuses: Some(status_map(&document)),
        };

        let report = h.sync.run_full_sync(&options).await.unwrap();

        assert_eq!(report.statuses_applied, 2);
        let watch = h.store.watch_snapshot().await.unwrap();
        assert_eq!(watch.len(), 2);
        assert_eq!(watch[&2], WatchStatus::Completed);
        assert_eq!(watch[&3], WatchStatus::Unknown);
    }

    #[tokio::test]
    async fn test_rate_limited_page_is_retried() {
        let h = harness(FakeSource::numbered(4).rate_limit_page(1, 2), fast_config(2)).await;

        let report = h.sync.run_full_sync(&FullSyncOptions::default()).await.unwrap();

        assert_eq!(report.rate_limit_hits, 2);
        assert_eq!(report.success, 4);
        assert_eq!(report.failures, 0);
        assert!(report.halted.is_none());
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_halts_run() {
        let h = harness(FakeSource::numbered(10).rate_limit_page(3, 100), fast_config(2)).await;

        let report = h.sync.run_full_sync(&FullSyncOptions::default()).await.unwrap();

        assert_eq!(
            report.halted,
            Some(HaltReason::RateLimitExhausted { page: 3, attempts: 4 })
        );
        assert_eq!(report.success, 4);
        assert_eq!(report.last_page, Some(2));
        // Page 4 was fetched alongside page 3 but is not persisted past the halt
        assert_eq!(h.cache.cached_pages().unwrap(), vec![1, 2]);
        assert_eq!(h.cache.resume_page().unwrap(), 3);

        let audit = h.store.recent_audit(1).await.unwrap();
        assert!(audit[0].description.starts_with("Full sync halted"));
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped() {
        let h = harness(FakeSource::numbered(6).fail_page(2), fast_config(2)).await;

        let report = h.sync.run_full_sync(&FullSyncOptions::default()).await.unwrap();

        assert_eq!(report.failures, 1);
        assert_eq!(report.success, 4);
        assert!(report.halted.is_none());
        let ids = h.store.catalog_ids().await.unwrap();
        assert!(!ids.contains(&3) && !ids.contains(&4));
        assert!(ids.contains(&5) && ids.contains(&6));
    }

    #[tokio::test]
    async fn test_resume_starts_after_cached_pages() {
        let h = harness(FakeSource::numbered(6), fast_config(2)).await;
        h.cache.save_page(1, &serde_json::json!([])).unwrap();
        h.cache.save_page(2, &serde_json::json!([])).unwrap();

        let options = FullSyncOptions {
            resume: true,
            statuses: None,
        };
        let report = h.sync.run_full_sync(&options).await.unwrap();

        assert_eq!(report.start_page, 3);
        assert_eq!(report.success, 2);
        assert_eq!(h.store.catalog_ids().await.unwrap(), HashSet::from([5, 6]));
    }

    #[tokio::test]
    async fn test_max_pages_limits_run() {
        let mut config = fast_config(2);
        config.max_pages = Some(3);
        let h = harness(FakeSource::numbered(20), config).await;

        let report = h.sync.run_full_sync(&FullSyncOptions::default()).await.unwrap();

        assert_eq!(report.pages_fetched, 3);
        assert_eq!(report.success, 6);
        assert_eq!(h.source.page_requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_progress_callback_sees_pages() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let h = harness(FakeSource::numbered(3), fast_config(2)).await;
        let sync = h.sync.with_progress(Arc::new(move |event: ProgressEvent| {
            if let ProgressEvent::PageSynced { page, .. } = event {
                sink.lock().unwrap().push(page);
            }
        }));

        sync.run_full_sync(&FullSyncOptions::default()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_work_queue_first_occurrence_wins() {
        let document = export(
            r#"{
                "Completed": [
                    {"name": "a", "al": "https://anilist.co/anime/1/"},
                    {"name": "no link"},
                    {"name": "b", "al": "https://anilist.co/anime/2/"}
                ],
                "Dropped": [{"name": "a again", "al": "https://anilist.co/anime/1/"}]
            }"#,
        );
        assert_eq!(
            work_queue(&document),
            vec![(1, WatchStatus::Completed), (2, WatchStatus::Completed)]
        );
    }

    #[tokio::test]
    async fn test_ingest_rebuilds_watch_list() {
        let h = harness(FakeSource::numbered(5), fast_config(2)).await;
        h.store
            .upsert_catalog_entries(&[crate::testing::entry(40, "Stale")])
            .await
            .unwrap();
        h.store.upsert_watch_status(40, Some(WatchStatus::Completed)).await.unwrap();

        let document = export(
            r#"{
                "Completed": [
                    {"name": "a", "al": "https://anilist.co/anime/1/"},
                    {"name": "b", "al": "https://anilist.co/anime/2/"},
                    {"name": "c", "al": "https://anilist.co/anime/3/"}
                ],
                "Planning": [
                    {"name": "a", "al": "https://anilist.co/anime/1/"},
                    {"name": "gone", "al": "https://anilist.co/anime/99/"}
                ]
            }"#,
        );

        let report = h.sync.run_ingest(&document).await.unwrap();

        assert_eq!(report.queued, 4);
        assert_eq!(report.success, 3);
        assert_eq!(report.failures, 1);
        assert_eq!(h.source.batch_requests.load(Ordering::SeqCst), 2);

        let watch = h.store.watch_snapshot().await.unwrap();
        assert_eq!(watch.len(), 3);
        assert_eq!(watch[&1], WatchStatus::Completed);
        assert!(!watch.contains_key(&40));

        let audit = h.store.recent_audit(1).await.unwrap();
        assert_eq!(audit[0].event, AuditEvent::Ingest);
        assert_eq!(audit[0].meta["queued"], 4);
    }

    #[tokio::test]
    async fn test_ingest_failed_batch_counts_every_id() {
        let h = harness(FakeSource::numbered(5).fail_id(4), fast_config(2)).await;
        let document = export(
            r#"{
                "Completed": [
                    {"name": "a", "al": "https://anilist.co/anime/1/"},
                    {"name": "b", "al": "https://anilist.co/anime/2/"},
                    {"name": "c", "al": "https://anilist.co/anime/3/"},
                    {"name": "d", "al": "https://anilist.co/anime/4/"},
                    {"name": "e", "al": "https://anilist.co/anime/5/"}
                ]
            }"#,
        );

        let report = h.sync.run_ingest(&document).await.unwrap();

        assert_eq!(report.queued, 5);
        assert_eq!(report.failures, 2);
        assert_eq!(report.success, 3);
        let ids = h.store.catalog_ids().await.unwrap();
        assert!(!ids.contains(&3) && !ids.contains(&4));
    }

    const TWO_LINKS: &str = r#"{
        "Completed": [
            {"name": "a", "al": "https://anilist.co/anime/1/"},
            {"name": "b", "al": "https://anilist.co/anime/2/"}
        ]
    }"#;

    #[tokio::test]
    async fn test_ingest_retries_rate_limited_batch() {
        let h = harness(FakeSource::numbered(5).rate_limit_batches(1), fast_config(2)).await;

        let report = h.sync.run_ingest(&export(TWO_LINKS)).await.unwrap();

        assert_eq!(report.success, 2);
        assert_eq!(report.failures, 0);
        assert_eq!(report.rate_limit_hits, 1);
        assert_eq!(h.source.batch_requests.load(Ordering::SeqCst), 2);
        let watch = h.store.watch_snapshot().await.unwrap();
        assert_eq!(watch[&1], WatchStatus::Completed);
        assert_eq!(watch[&2], WatchStatus::Completed);
    }

    #[tokio::test]
    async fn test_ingest_batch_fails_once_retries_run_out() {
        let h = harness(FakeSource::numbered(5).rate_limit_batches(100), fast_config(2)).await;

        let report = h.sync.run_ingest(&export(TWO_LINKS)).await.unwrap();

        assert_eq!(report.success, 0);
        assert_eq!(report.failures, 2);
        assert_eq!(report.rate_limit_hits, 4);
        assert_eq!(h.source.batch_requests.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_page_is_archived_only_after_it_is_stored() {
        let h = harness(FakeSource::numbered(4), fast_config(2)).await;
        sqlx::query(
            "CREATE TRIGGER reject_watch BEFORE INSERT ON user_watch_entries \
             WHEN NEW.external_id = 3 BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(h.store.pool())
        .await
        .unwrap();
        let options = FullSyncOptions {
            resume: false,
            statuses: Some(HashMap::from([(1, WatchStatus::Completed), (3, WatchStatus::Dropped)])),
        };

        let report = h.sync.run_full_sync(&options).await.unwrap();

        assert_eq!(report.failures, 1);
        assert_eq!(report.pages_fetched, 1);
        assert_eq!(h.cache.cached_pages().unwrap(), vec![1]);
        assert_eq!(h.cache.resume_page().unwrap(), 2);
    }
}
