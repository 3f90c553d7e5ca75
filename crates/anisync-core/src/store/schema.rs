use sqlx::SqlitePool;

const CREATE_STATEMENTS: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS catalog_entries (
        external_id INTEGER PRIMARY KEY,
        title_romaji TEXT NOT NULL,
        title_english TEXT,
        title_native TEXT,
        description TEXT,
        banner_image TEXT,
        cover_image TEXT,
        start_date TEXT,
        end_date TEXT,
        status TEXT,
        episodes INTEGER,
        duration INTEGER,
        genres TEXT NOT NULL DEFAULT '[]',
        average_score INTEGER,
        studios TEXT NOT NULL DEFAULT '[]',
        source TEXT,
        mal_id INTEGER,
        site_url TEXT,
        format TEXT,
        season TEXT,
        season_year INTEGER,
        popularity INTEGER,
        favourites INTEGER,
        is_adult INTEGER NOT NULL DEFAULT 0,
        relations TEXT NOT NULL DEFAULT '[]',
        title_romaji_folded TEXT NOT NULL DEFAULT '',
        title_english_folded TEXT,
        updated_at TEXT NOT NULL
    )
    "#,
    // *_folded columns hold quote-stripped, Unicode-lowercased titles
    "CREATE INDEX IF NOT EXISTS idx_catalog_title_romaji_folded ON catalog_entries(title_romaji_folded)",
    "CREATE INDEX IF NOT EXISTS idx_catalog_title_english_folded ON catalog_entries(title_english_folded)",
    r#"
    CREATE TABLE IF NOT EXISTS user_watch_entries (
        external_id INTEGER PRIMARY KEY REFERENCES catalog_entries(external_id) ON DELETE CASCADE,
        status TEXT,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_type TEXT NOT NULL,
        description TEXT NOT NULL,
        meta TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_audit_created_at ON audit_log(created_at)",
];

/// Create tables and indexes if they don't exist
pub(super) async fn init_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in CREATE_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
