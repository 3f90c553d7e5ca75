use super::schema::init_tables;
use super::CatalogStore;
use crate::diff::{CatalogSnapshot, WatchSnapshot};
use crate::error::StoreError;
use anisync_models::{AuditEvent, AuditLogEntry, CatalogEntry, UserWatchEntry, WatchStatus};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const UPSERT_CATALOG_SQL: &str = r#"
    INSERT INTO catalog_entries (
        external_id, title_romaji, title_english, title_native, description,
        banner_image, cover_image, start_date, end_date, status, episodes, duration,
        genres, average_score, studios, source, mal_id, site_url, format, season,
        season_year, popularity, favourites, is_adult, relations,
        title_romaji_folded, title_english_folded, updated_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(external_id) DO UPDATE SET
        title_romaji = excluded.title_romaji,
        title_english = excluded.title_english,
        title_native = excluded.title_native,
        description = excluded.description,
        banner_image = excluded.banner_image,
        cover_image = excluded.cover_image,
        start_date = excluded.start_date,
        end_date = excluded.end_date,
        status = excluded.status,
        episodes = excluded.episodes,
        duration = excluded.duration,
        genres = excluded.genres,
        average_score = excluded.average_score,
        studios = excluded.studios,
        source = excluded.source,
        mal_id = excluded.mal_id,
        site_url = excluded.site_url,
        format = excluded.format,
        season = excluded.season,
        season_year = excluded.season_year,
        popularity = excluded.popularity,
        favourites = excluded.favourites,
        is_adult = excluded.is_adult,
        relations = excluded.relations,
        title_romaji_folded = excluded.title_romaji_folded,
        title_english_folded = excluded.title_english_folded,
        updated_at = excluded.updated_at
"#;

const UPSERT_WATCH_SQL: &str = r#"
    INSERT INTO user_watch_entries (external_id, status, updated_at)
    VALUES (?, ?, ?)
    ON CONFLICT(external_id) DO UPDATE SET
        status = excluded.status,
        updated_at = excluded.updated_at
"#;

/// SQLite-backed [`CatalogStore`]
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and make sure the schema exists
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!("Opening database: {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        init_tables(&pool).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database; lives as long as the store
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // One connection that never expires, or the database vanishes with it
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        init_tables(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn encode_json<T: Serialize>(column: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Json { column, source })
}

fn decode_json<T: DeserializeOwned>(column: &'static str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Json { column, source })
}

fn decode_status(raw: Option<String>) -> Result<Option<WatchStatus>, StoreError> {
    raw.map(|value| {
        WatchStatus::from_str(&value).map_err(|_| StoreError::InvalidValue {
            column: "status",
            value,
        })
    })
    .transpose()
}

async fn write_catalog_entry<'c, E>(executor: E, entry: &CatalogEntry) -> Result<(), StoreError>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let genres = encode_json("genres", &entry.genres)?;
    let studios = encode_json("studios", &entry.studios)?;
    let relations = encode_json("relations", &entry.relations)?;

    sqlx::query(UPSERT_CATALOG_SQL)
        .bind(entry.external_id)
        .bind(entry.title_romaji.clone())
        .bind(entry.title_english.clone())
        .bind(entry.title_native.clone())
        .bind(entry.description.clone())
        .bind(entry.banner_image.clone())
        .bind(entry.cover_image.clone())
        .bind(entry.start_date)
        .bind(entry.end_date)
        .bind(entry.status.clone())
        .bind(entry.episodes)
        .bind(entry.duration)
        .bind(genres)
        .bind(entry.average_score)
        .bind(studios)
        .bind(entry.source.clone())
        .bind(entry.mal_id)
        .bind(entry.site_url.clone())
        .bind(entry.format.clone())
        .bind(entry.season.clone())
        .bind(entry.season_year)
        .bind(entry.popularity)
        .bind(entry.favourites)
        .bind(entry.is_adult)
        .bind(relations)
        .bind(fold_title(&entry.title_romaji))
        .bind(entry.title_english.as_deref().map(fold_title))
        .bind(Utc::now())
        .execute(executor)
        .await?;

    Ok(())
}

async fn write_watch_status<'c, E>(executor: E, id: i64, status: Option<WatchStatus>) -> Result<(), StoreError>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    sqlx::query(UPSERT_WATCH_SQL)
        .bind(id)
        .bind(status.map(|s| s.as_str()))
        .bind(Utc::now())
        .execute(executor)
        .await?;
    Ok(())
}

fn catalog_entry_from_row(row: &SqliteRow) -> Result<CatalogEntry, StoreError> {
    let genres: String = row.try_get("genres")?;
    let studios: String = row.try_get("studios")?;
    let relations: String = row.try_get("relations")?;

    Ok(CatalogEntry {
        external_id: row.try_get("external_id")?,
        title_romaji: row.try_get("title_romaji")?,
        title_english: row.try_get("title_english")?,
        title_native: row.try_get("title_native")?,
        description: row.try_get("description")?,
        banner_image: row.try_get("banner_image")?,
        cover_image: row.try_get("cover_image")?,
        start_date: row.try_get::<Option<NaiveDate>, _>("start_date")?,
        end_date: row.try_get::<Option<NaiveDate>, _>("end_date")?,
        status: row.try_get("status")?,
        episodes: row.try_get("episodes")?,
        duration: row.try_get("duration")?,
        genres: decode_json("genres", &genres)?,
        average_score: row.try_get("average_score")?,
        studios: decode_json("studios", &studios)?,
        source: row.try_get("source")?,
        mal_id: row.try_get("mal_id")?,
        site_url: row.try_get("site_url")?,
        format: row.try_get("format")?,
        season: row.try_get("season")?,
        season_year: row.try_get("season_year")?,
        popularity: row.try_get("popularity")?,
        favourites: row.try_get("favourites")?,
        is_adult: row.try_get("is_adult")?,
        relations: decode_json("relations", &relations)?,
    })
}

fn audit_entry_from_row(row: &SqliteRow) -> Result<AuditLogEntry, StoreError> {
    let event: String = row.try_get("event_type")?;
    let meta: String = row.try_get("meta")?;

    Ok(AuditLogEntry {
        id: Some(row.try_get("id")?),
        event: AuditEvent::from_str(&event).map_err(|_| StoreError::InvalidValue {
            column: "event_type",
            value: event.clone(),
        })?,
        description: row.try_get("description")?,
        meta: decode_json("meta", &meta)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

/// Remove quote characters, which exports and catalog titles use inconsistently
/// Comparison key for title lookups: quotes dropped, trimmed, Unicode lowercase
fn fold_title(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| *c != '\'' && *c != '"').collect();
    stripped.trim().to_lowercase()
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn catalog_snapshot(&self) -> Result<CatalogSnapshot, StoreError> {
        let rows = sqlx::query("SELECT * FROM catalog_entries")
            .fetch_all(&self.pool)
            .await?;

        let mut snapshot = CatalogSnapshot::with_capacity(rows.len());
        for row in &rows {
            let entry = catalog_entry_from_row(row)?;
            snapshot.insert(entry.external_id, entry);
        }
        debug!("Loaded catalog snapshot: {} entries", snapshot.len());
        Ok(snapshot)
    }

    async fn watch_snapshot(&self) -> Result<WatchSnapshot, StoreError> {
        let rows = sqlx::query("SELECT external_id, status FROM user_watch_entries WHERE status IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;

        let mut snapshot = WatchSnapshot::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.try_get("external_id")?;
            if let Some(status) = decode_status(row.try_get("status")?)? {
                snapshot.insert(id, status);
            }
        }
        debug!("Loaded watch snapshot: {} entries", snapshot.len());
        Ok(snapshot)
    }

    async fn catalog_ids(&self) -> Result<HashSet<i64>, StoreError> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT external_id FROM catalog_entries")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn get_catalog_entry(&self, id: i64) -> Result<Option<CatalogEntry>, StoreError> {
        let row = sqlx::query("SELECT * FROM catalog_entries WHERE external_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(catalog_entry_from_row).transpose()
    }

    async fn get_watch_entry(&self, id: i64) -> Result<Option<UserWatchEntry>, StoreError> {
        let row = sqlx::query("SELECT external_id, status, updated_at FROM user_watch_entries WHERE external_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(UserWatchEntry {
                external_id: row.try_get("external_id")?,
                status: decode_status(row.try_get("status")?)?,
                updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn find_by_title(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let folded = fold_title(name);
        if folded.is_empty() {
            return Ok(None);
        }

        let id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT external_id FROM catalog_entries
            WHERE title_romaji_folded = ? OR title_english_folded = ?
            ORDER BY external_id
            LIMIT 1
            "#,
        )
        .bind(&folded)
        .bind(&folded)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn upsert_catalog_entry(&self, entry: &CatalogEntry) -> Result<(), StoreError> {
        write_catalog_entry(&self.pool, entry).await
    }

    async fn upsert_catalog_entries(&self, entries: &[CatalogEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            write_catalog_entry(&mut *tx, entry).await?;
        }
        tx.commit().await?;
        debug!("Upserted {} catalog entries", entries.len());
        Ok(())
    }

    async fn upsert_watch_status(&self, id: i64, status: Option<WatchStatus>) -> Result<(), StoreError> {
        write_watch_status(&self.pool, id, status).await
    }

    async fn upsert_watch_statuses(&self, updates: &[(i64, WatchStatus)]) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for (id, status) in updates {
            write_watch_status(&mut *tx, *id, Some(*status)).await?;
        }
        tx.commit().await?;
        debug!("Upserted {} watch statuses", updates.len());
        Ok(())
    }

    async fn purge_watch_entries(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM user_watch_entries")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn purge_catalog(&self) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM user_watch_entries")
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM catalog_entries")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<i64, StoreError> {
        let meta = encode_json("meta", &entry.meta)?;
        let result = sqlx::query(
            "INSERT INTO audit_log (event_type, description, meta, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(entry.event.as_str())
        .bind(entry.description.clone())
        .bind(meta)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn recent_audit(&self, limit: u32) -> Result<Vec<AuditLogEntry>, StoreError> {
        let rows = sqlx::query("SELECT * FROM audit_log ORDER BY id DESC LIMIT ?")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(audit_entry_from_row).collect()
    }
}
