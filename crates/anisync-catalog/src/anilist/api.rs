use anisync_models::{CatalogEntry, RelatedTitle};
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use crate::error::CatalogError;
use crate::traits::CatalogPage;

macro_rules! media_fields {
    () => {
        "
        id
        idMal
        title { romaji english native }
        description
        bannerImage
        coverImage { extraLarge large medium }
        startDate { year month day }
        endDate { year month day }
        status
        episodes
        duration
        genres
        averageScore
        popularity
        favourites
        studios(isMain: true) { nodes { name } }
        source
        siteUrl
        format
        season
        seasonYear
        isAdult
        relations {
          edges {
            relationType
            node {
              id
              title { romaji english }
              coverImage { medium }
              status
              format
              season
              seasonYear
            }
          }
        }
        "
    };
}

const MEDIA_QUERY: &str = concat!(
    "query ($id: Int) { Media(id: $id, type: ANIME) {",
    media_fields!(),
    "} }"
);

const PAGE_QUERY: &str = concat!(
    "query ($page: Int, $perPage: Int) { Page(page: $page, perPage: $perPage) { ",
    "pageInfo { hasNextPage total } ",
    "media(type: ANIME, sort: ID) {",
    media_fields!(),
    "} } }"
);

const IDS_QUERY: &str = concat!(
    "query ($ids: [Int], $page: Int, $perPage: Int) { Page(page: $page, perPage: $perPage) { ",
    "media(id_in: $ids, type: ANIME) {",
    media_fields!(),
    "} } }"
);

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a, V: Serialize> {
    query: &'a str,
    variables: V,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AniListTitle {
    romaji: Option<String>,
    english: Option<String>,
    native: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AniListCoverImage {
    extra_large: Option<String>,
    large: Option<String>,
    medium: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FuzzyDate {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StudioNode {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct StudioConnection {
    #[serde(default)]
    nodes: Vec<StudioNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelatedNode {
    id: i64,
    title: Option<AniListTitle>,
    cover_image: Option<AniListCoverImage>,
    status: Option<String>,
    format: Option<String>,
    season: Option<String>,
    season_year: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationEdge {
    relation_type: Option<String>,
    node: Option<RelatedNode>,
}

#[derive(Debug, Default, Deserialize)]
struct RelationConnection {
    #[serde(default)]
    edges: Vec<RelationEdge>,
}

/// `Media` object as returned by the AniList GraphQL API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AniListMedia {
    id: i64,
    id_mal: Option<i64>,
    title: AniListTitle,
    description: Option<String>,
    banner_image: Option<String>,
    cover_image: Option<AniListCoverImage>,
    start_date: Option<FuzzyDate>,
    end_date: Option<FuzzyDate>,
    status: Option<String>,
    episodes: Option<i64>,
    duration: Option<i64>,
    genres: Option<Vec<String>>,
    average_score: Option<i64>,
    popularity: Option<i64>,
    favourites: Option<i64>,
    studios: Option<StudioConnection>,
    source: Option<String>,
    site_url: Option<String>,
    format: Option<String>,
    season: Option<String>,
    season_year: Option<i64>,
    is_adult: Option<bool>,
    relations: Option<RelationConnection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: Option<bool>,
}

/// Catalog dates are fuzzy; month and day default to the 1st, no year means no date
pub(crate) fn format_date(date: Option<&FuzzyDate>) -> Option<NaiveDate> {
    let date = date?;
    let year = date.year?;
    NaiveDate::from_ymd_opt(year, date.month.unwrap_or(1).max(1), date.day.unwrap_or(1).max(1))
}

pub(crate) fn map_media(media: AniListMedia) -> CatalogEntry {
    let cover_image = media
        .cover_image
        .and_then(|c| c.extra_large.or(c.large));

    let relations = media
        .relations
        .unwrap_or_default()
        .edges
        .into_iter()
        .filter_map(|edge| {
            let node = edge.node?;
            let title = node
                .title
                .and_then(|t| t.english.or(t.romaji));
            Some(RelatedTitle {
                id: node.id,
                relation: edge.relation_type.unwrap_or_else(|| "OTHER".to_string()),
                title,
                image: node.cover_image.and_then(|c| c.medium),
                status: node.status,
                format: node.format,
                season: node.season,
                season_year: node.season_year,
            })
        })
        .collect();

    CatalogEntry {
        external_id: media.id,
        title_romaji: media.title.romaji.unwrap_or_default(),
        title_english: media.title.english,
        title_native: media.title.native,
        description: media.description,
        banner_image: media.banner_image,
        cover_image,
        start_date: format_date(media.start_date.as_ref()),
        end_date: format_date(media.end_date.as_ref()),
        status: media.status,
        episodes: media.episodes,
        duration: media.duration,
        genres: media.genres.unwrap_or_default().into_iter().collect(),
        average_score: media.average_score,
        studios: media
            .studios
            .unwrap_or_default()
            .nodes
            .into_iter()
            .map(|s| s.name)
            .collect(),
        source: media.source,
        mal_id: media.id_mal,
        site_url: media.site_url,
        format: media.format,
        season: media.season,
        season_year: media.season_year,
        popularity: media.popularity,
        favourites: media.favourites,
        is_adult: media.is_adult.unwrap_or(false),
        relations,
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn graphql_errors(body: &serde_json::Value) -> Option<String> {
    let errors: Vec<GraphqlError> = serde_json::from_value(body.get("errors")?.clone()).ok()?;
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// POST a query and return the `data` object of the response
async fn post_query<V: Serialize>(
    client: &Client,
    endpoint: &str,
    query: &str,
    variables: V,
) -> Result<serde_json::Value, CatalogError> {
    let response = client
        .post(endpoint)
        .header("Accept", "application/json")
        .json(&GraphqlRequest { query, variables })
        .send()
        .await?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after(&response);
        warn!(retry_after = ?retry_after, "Catalog API rate limit hit");
        return Err(CatalogError::RateLimited { retry_after });
    }

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(CatalogError::Http {
            status: status.as_u16(),
            body: error_text,
        });
    }

    let body: serde_json::Value = response.json().await?;
    let data = body.get("data").filter(|d| !d.is_null()).cloned();
    match (data, graphql_errors(&body)) {
        (Some(data), errors) => {
            if let Some(errors) = errors {
                debug!("Catalog returned partial data with errors: {}", errors);
            }
            Ok(data)
        }
        (None, Some(errors)) => Err(CatalogError::Graphql(errors)),
        (None, None) => Err(CatalogError::Decode("response has neither data nor errors".to_string())),
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value, what: &str) -> Result<T, CatalogError> {
    serde_json::from_value(value).map_err(|e| CatalogError::Decode(format!("{}: {}", what, e)))
}

/// Fetch one anime by catalog ID
pub async fn fetch_media(
    client: &Client,
    endpoint: &str,
    id: i64,
) -> Result<Option<CatalogEntry>, CatalogError> {
    let data = match post_query(client, endpoint, MEDIA_QUERY, serde_json::json!({ "id": id })).await {
        Ok(data) => data,
        // AniList answers unknown IDs with a 404 carrying a "Not Found." GraphQL error
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e),
    };

    match data.get("Media").filter(|m| !m.is_null()) {
        Some(media) => {
            let media: AniListMedia = decode(media.clone(), "Media")?;
            Ok(Some(map_media(media)))
        }
        None => Ok(None),
    }
}

/// Fetch the anime whose IDs are in `ids` (at most one page worth)
pub async fn fetch_media_by_ids(
    client: &Client,
    endpoint: &str,
    ids: &[i64],
) -> Result<Vec<CatalogEntry>, CatalogError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let variables = serde_json::json!({ "ids": ids, "page": 1, "perPage": ids.len() });
    let data = post_query(client, endpoint, IDS_QUERY, variables).await?;

    let media = data
        .pointer("/Page/media")
        .cloned()
        .ok_or_else(|| CatalogError::Decode("missing Page.media".to_string()))?;
    let media: Vec<AniListMedia> = decode(media, "Page.media")?;

    debug!("Fetched {} of {} requested catalog entries", media.len(), ids.len());
    Ok(media.into_iter().map(map_media).collect())
}

/// Fetch one page of the full anime listing, sorted by ID
pub async fn fetch_media_page(
    client: &Client,
    endpoint: &str,
    page: u32,
    per_page: u32,
) -> Result<CatalogPage, CatalogError> {
    let variables = serde_json::json!({ "page": page, "perPage": per_page });
    let data = post_query(client, endpoint, PAGE_QUERY, variables).await?;

    let raw = data
        .pointer("/Page/media")
        .cloned()
        .ok_or_else(|| CatalogError::Decode("missing Page.media".to_string()))?;
    let page_info: Option<PageInfo> = data
        .pointer("/Page/pageInfo")
        .cloned()
        .map(|v| decode(v, "Page.pageInfo"))
        .transpose()?;
    let media: Vec<AniListMedia> = decode(raw.clone(), "Page.media")?;

    Ok(CatalogPage {
        page,
        entries: media.into_iter().map(map_media).collect(),
        raw,
        has_next_page: page_info.and_then(|p| p.has_next_page).unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_media() -> serde_json::Value {
        serde_json::json!({
            "id": 21,
            "idMal": 21,
            "title": { "romaji": "ONE PIECE", "english": "ONE PIECE", "native": "ONE PIECE" },
            "description": "Gold Roger was known as the Pirate King.",
            "bannerImage": "https://img/banner/21.jpg",
            "coverImage": { "extraLarge": null, "large": "https://img/cover/large/21.jpg", "medium": "https://img/cover/medium/21.jpg" },
            "startDate": { "year": 1999, "month": 10, "day": 20 },
            "endDate": { "year": null, "month": null, "day": null },
            "status": "RELEASING",
            "episodes": null,
            "duration": 24,
            "genres": ["Action", "Adventure", "Comedy", "Action"],
            "averageScore": 88,
            "popularity": 500000,
            "favourites": 80000,
            "studios": { "nodes": [{ "name": "Toei Animation" }] },
            "source": "MANGA",
            "siteUrl": "https://anilist.co/anime/21",
            "format": "TV",
            "season": "FALL",
            "seasonYear": 1999,
            "isAdult": false,
            "relations": { "edges": [
                {
                    "relationType": "SOURCE",
                    "node": {
                        "id": 30013,
                        "title": { "romaji": "ONE PIECE", "english": null },
                        "coverImage": { "medium": "https://img/cover/medium/30013.jpg" },
                        "status": "RELEASING",
                        "format": "MANGA",
                        "season": null,
                        "seasonYear": null
                    }
                },
                { "relationType": "SIDE_STORY", "node": null }
            ] }
        })
    }

    #[test]
    fn test_map_media() {
        let media: AniListMedia = serde_json::from_value(sample_media()).unwrap();
        let entry = map_media(media);

        assert_eq!(entry.external_id, 21);
        assert_eq!(entry.mal_id, Some(21));
        assert_eq!(entry.title_romaji, "ONE PIECE");
        // extraLarge is null, so the large cover is used
        assert_eq!(entry.cover_image.as_deref(), Some("https://img/cover/large/21.jpg"));
        assert_eq!(entry.start_date, NaiveDate::from_ymd_opt(1999, 10, 20));
        assert_eq!(entry.end_date, None);
        assert_eq!(entry.genres.len(), 3);
        assert!(entry.genres.contains("Adventure"));
        assert_eq!(entry.studios, vec!["Toei Animation".to_string()]);
        assert_eq!(entry.site_url.as_deref(), Some("https://anilist.co/anime/21"));
        assert!(!entry.is_adult);

        assert_eq!(entry.relations.len(), 1);
        let related = &entry.relations[0];
        assert_eq!(related.id, 30013);
        assert_eq!(related.relation, "SOURCE");
        assert_eq!(related.title.as_deref(), Some("ONE PIECE"));
        assert_eq!(related.format.as_deref(), Some("MANGA"));
    }

    #[test]
    fn test_format_date_defaults() {
        let partial = FuzzyDate { year: Some(2006), month: Some(4), day: None };
        assert_eq!(format_date(Some(&partial)), NaiveDate::from_ymd_opt(2006, 4, 1));

        let year_only = FuzzyDate { year: Some(2006), month: None, day: None };
        assert_eq!(format_date(Some(&year_only)), NaiveDate::from_ymd_opt(2006, 1, 1));

        let no_year = FuzzyDate { year: None, month: Some(4), day: Some(2) };
        assert_eq!(format_date(Some(&no_year)), None);
        assert_eq!(format_date(None), None);
    }

    #[test]
    fn test_minimal_media_maps() {
        let media: AniListMedia = serde_json::from_value(serde_json::json!({
            "id": 5,
            "title": { "romaji": "Cowboy Bebop: Tengoku no Tobira" }
        }))
        .unwrap();
        let entry = map_media(media);
        assert_eq!(entry.external_id, 5);
        assert!(entry.genres.is_empty());
        assert!(entry.studios.is_empty());
        assert!(entry.relations.is_empty());
        assert_eq!(entry.cover_image, None);
    }

    #[test]
    fn test_graphql_errors_joined() {
        let body = serde_json::json!({
            "data": null,
            "errors": [{ "message": "Not Found.", "status": 404 }, { "message": "Other" }]
        });
        assert_eq!(graphql_errors(&body).as_deref(), Some("Not Found.; Other"));
        assert_eq!(graphql_errors(&serde_json::json!({ "data": {} })), None);
    }

    #[test]
    fn test_query_shapes() {
        assert!(PAGE_QUERY.contains("hasNextPage"));
        assert!(PAGE_QUERY.contains("relationType"));
        assert!(IDS_QUERY.contains("id_in: $ids"));
        assert!(MEDIA_QUERY.contains("Media(id: $id, type: ANIME)"));
    }
}
