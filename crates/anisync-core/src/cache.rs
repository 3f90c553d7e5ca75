use anisync_config::PathManager;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// On-disk archive of raw catalog pages, one `page_<n>.json` per page.
///
/// The highest cached page number is where an interrupted full sync resumes.
#[derive(Clone)]
pub struct RawPageCache {
    dir: PathBuf,
}

impl RawPageCache {
    pub fn new(path_manager: &PathManager) -> io::Result<Self> {
        Self::at(path_manager.raw_page_dir())
    }

    pub fn at(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn page_path(&self, page: u32) -> PathBuf {
        self.dir.join(format!("page_{}.json", page))
    }

    fn page_number(file_name: &str) -> Option<u32> {
        file_name
            .strip_prefix("page_")?
            .strip_suffix(".json")?
            .parse()
            .ok()
    }

    pub fn save_page(&self, page: u32, raw: &serde_json::Value) -> io::Result<()> {
        let json = serde_json::to_string_pretty(raw)?;
        std::fs::write(self.page_path(page), json)?;
        debug!("Raw page cached: page {}", page);
        Ok(())
    }

    /// Cached page contents; a corrupted file is deleted and reported as a miss
    fn load_page(&self, page: u32) -> Option<serde_json::Value> {
        let path = self.page_path(page);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Raw page cache miss: page {}", page);
                return None;
            }
            Err(e) => {
                warn!("Failed to read cached page {}: {}", page, e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    "Cache corruption detected for page {}: {}. Deleting corrupted file.",
                    page, e
                );
                if let Err(rm_err) = std::fs::remove_file(&path) {
                    warn!("Failed to delete corrupted cache file: {}", rm_err);
                }
                None
            }
        }
    }

    /// Page numbers present in the cache, ascending
    pub fn cached_pages(&self) -> io::Result<Vec<u32>> {
        let mut pages = Vec::new();
        for item in std::fs::read_dir(&self.dir)? {
            let item = item?;
            if let Some(page) = item.file_name().to_str().and_then(Self::page_number) {
                pages.push(page);
            }
        }
        pages.sort_unstable();
        Ok(pages)
    }

    /// First page not yet archived: one past the highest readable cached page, or 1.
    ///
    /// Trailing pages that fail to parse (a run killed mid-write) are deleted
    /// and fetched again.
    pub fn resume_page(&self) -> io::Result<u32> {
        let mut next = 1;
        for page in self.cached_pages()?.into_iter().rev() {
            if self.load_page(page).is_some() {
                next = page.saturating_add(1);
                break;
            }
            warn!("Cached page {} is unreadable, resuming before it", page);
        }
        info!("Raw page cache resumes at page {}", next);
        Ok(next)
    }

    /// Delete every cached page; returns how many were removed
    pub fn clear(&self) -> io::Result<usize> {
        let pages = self.cached_pages()?;
        for page in &pages {
            std::fs::remove_file(self.page_path(*page))?;
        }
        info!("Cleared {} cached raw pages", pages.len());
        Ok(pages.len())
    }
}
