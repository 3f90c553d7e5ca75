// Catalog ID extraction from export permalinks

use once_cell::sync::Lazy;
use regex::Regex;

static PERMALINK_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"anilist\.co/anime/(\d+)").expect("permalink pattern is valid")
});

/// Extract the catalog ID from a permalink such as
/// `https://anilist.co/anime/21/one-piece`
///
/// Returns `None` for a missing, empty or non-matching permalink. Callers
/// treat that as "fall back to title lookup", never as an error.
pub fn extract_external_id(permalink: Option<&str>) -> Option<i64> {
    let permalink = permalink?.trim();
    if permalink.is_empty() {
        return None;
    }
    PERMALINK_ID
        .captures(permalink)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
}
