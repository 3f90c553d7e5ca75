use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A title in the external catalog, keyed by its catalog ID
///
/// `status` is the airing lifecycle reported by the catalog (RELEASING,
/// FINISHED, ...) and is unrelated to the user's watch status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub external_id: i64,
    pub title_romaji: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_english: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_native: Option<String>,
    pub description: Option<String>,
    pub banner_image: Option<String>,
    pub cover_image: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub episodes: Option<i64>,
    pub duration: Option<i64>,
    #[serde(default)]
    pub genres: BTreeSet<String>,
    pub average_score: Option<i64>,
    #[serde(default)]
    pub studios: Vec<String>,
    pub source: Option<String>,
    pub mal_id: Option<i64>,
    pub site_url: Option<String>,
    pub format: Option<String>,
    pub season: Option<String>,
    pub season_year: Option<i64>,
    pub popularity: Option<i64>,
    pub favourites: Option<i64>,
    #[serde(default)]
    pub is_adult: bool,
    #[serde(default)]
    pub relations: Vec<RelatedTitle>,
}

impl CatalogEntry {
    /// Entry carrying nothing but the catalog ID (metadata is hydrated later)
    pub fn bare(external_id: i64) -> Self {
        Self {
            external_id,
            ..Self::default()
        }
    }

    /// Title for display: English when the catalog has one, romanized otherwise
    pub fn display_title(&self) -> &str {
        self.title_english
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.title_romaji)
    }
}

/// An edge from one catalog entry to another (sequel, prequel, side story...)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelatedTitle {
    pub id: i64,
    pub relation: String,
    pub title: Option<String>,
    pub image: Option<String>,
    pub status: Option<String>,
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_year: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_title_prefers_english() {
        let mut entry = CatalogEntry::bare(21);
        entry.title_romaji = "ONE PIECE".to_string();
        assert_eq!(entry.display_title(), "ONE PIECE");

        entry.title_english = Some("One Piece".to_string());
        assert_eq!(entry.display_title(), "One Piece");

        entry.title_english = Some(String::new());
        assert_eq!(entry.display_title(), "ONE PIECE");
    }

    #[test]
    fn test_bare_entry_has_only_id() {
        let entry = CatalogEntry::bare(100);
        assert_eq!(entry.external_id, 100);
        assert!(entry.title_romaji.is_empty());
        assert!(entry.genres.is_empty());
        assert!(entry.relations.is_empty());
    }
}
