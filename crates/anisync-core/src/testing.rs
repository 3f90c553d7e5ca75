// In-process catalog fake shared by the unit tests

use anisync_catalog::{CatalogError, CatalogPage, CatalogSource};
use anisync_models::CatalogEntry;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) fn entry(id: i64, romaji: &str) -> CatalogEntry {
    CatalogEntry {
        external_id: id,
        title_romaji: romaji.to_string(),
        ..CatalogEntry::default()
    }
}

#[derive(Default)]
pub(crate) struct FakeSource {
    entries: BTreeMap<i64, CatalogEntry>,
    /// Remaining 429 responses per page number
    rate_limits: Mutex<HashMap<u32, u32>>,
    /// Remaining 429 responses for batch lookups
    batch_rate_limits: Mutex<u32>,
    failing_pages: HashSet<u32>,
    failing_ids: HashSet<i64>,
    unavailable: bool,
    pub(crate) page_requests: AtomicUsize,
    pub(crate) entry_requests: AtomicUsize,
    pub(crate) batch_requests: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn with_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.external_id, e)).collect(),
            ..Self::default()
        }
    }

    /// Catalog of `count` titles with IDs 1..=count
    pub(crate) fn numbered(count: i64) -> Self {
        Self::with_entries((1..=count).map(|id| entry(id, &format!("Title {}", id))))
    }

    pub(crate) fn rate_limit_page(self, page: u32, times: u32) -> Self {
        if let Ok(mut limits) = self.rate_limits.lock() {
            limits.insert(page, times);
        }
        self
    }

    /// The next `times` batch lookups answer 429
    pub(crate) fn rate_limit_batches(self, times: u32) -> Self {
        if let Ok(mut remaining) = self.batch_rate_limits.lock() {
            *remaining = times;
        }
        self
    }

    pub(crate) fn fail_page(mut self, page: u32) -> Self {
        self.failing_pages.insert(page);
        self
    }

    /// Any batch containing `id` fails
    pub(crate) fn fail_id(mut self, id: i64) -> Self {
        self.failing_ids.insert(id);
        self
    }

    /// Every single-item lookup fails with a server error
    pub(crate) fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn take_rate_limit(&self, page: u32) -> bool {
        let mut limits = self.rate_limits.lock().unwrap();
        match limits.get_mut(&page) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl CatalogSource for FakeSource {
    fn source_name(&self) -> &str {
        "fake"
    }

    async fn fetch_entry(&self, id: i64) -> Result<Option<CatalogEntry>, CatalogError> {
        self.entry_requests.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(CatalogError::Http {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.entries.get(&id).cloned())
    }

    async fn fetch_entries(&self, ids: &[i64]) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.batch_requests.fetch_add(1, Ordering::SeqCst);
        {
            let mut remaining = self.batch_rate_limits.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CatalogError::RateLimited { retry_after: None });
            }
        }
        if ids.iter().any(|id| self.failing_ids.contains(id)) {
            return Err(CatalogError::Graphql("batch failed".to_string()));
        }
        Ok(ids.iter().filter_map(|id| self.entries.get(id).cloned()).collect())
    }

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<CatalogPage, CatalogError> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        if self.take_rate_limit(page) {
            return Err(CatalogError::RateLimited { retry_after: None });
        }
        if self.failing_pages.contains(&page) {
            return Err(CatalogError::Http {
                status: 500,
                body: "page failed".to_string(),
            });
        }

        let skip = (page.saturating_sub(1) * per_page) as usize;
        let entries: Vec<CatalogEntry> = self
            .entries
            .values()
            .skip(skip)
            .take(per_page as usize)
            .cloned()
            .collect();
        let has_next_page = skip + entries.len() < self.entries.len();
        let raw = json!(entries
            .iter()
            .map(|e| json!({ "id": e.external_id, "title": { "romaji": e.title_romaji } }))
            .collect::<Vec<_>>());

        Ok(CatalogPage {
            page,
            entries,
            raw,
            has_next_page,
        })
    }
}
