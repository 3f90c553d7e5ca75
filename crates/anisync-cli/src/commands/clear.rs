use crate::output::Output;
use anisync_config::PathManager;
use anisync_core::RawPageCache;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::fs;
use std::path::PathBuf;

pub async fn run_clear(
    config_path: Option<PathBuf>,
    all: bool,
    cache: bool,
    database: bool,
    output: &Output,
) -> Result<()> {
    let path_manager = PathManager::default();

    if !(all || cache || database) {
        output.warn("No clear option specified. Use --cache, --database, or --all");
        output.info("\nExample: anisync clear --cache");
        return Ok(());
    }

    if all || cache {
        clear_cache(&path_manager, output)?;
    }
    if all || database {
        let config = super::load_config(&path_manager, config_path.as_deref())?;
        clear_database(config.database_path(&path_manager), output)?;
    }

    Ok(())
}

fn clear_cache(path_manager: &PathManager, output: &Output) -> Result<()> {
    let dir = path_manager.raw_page_dir();
    if !dir.exists() {
        output.info("No page cache found to clear");
        return Ok(());
    }

    let cache = RawPageCache::at(&dir)
        .map_err(|e| eyre!("Failed to open page cache at {}: {}", dir.display(), e))?;
    let removed = cache
        .clear()
        .map_err(|e| eyre!("Failed to clear page cache at {}: {}", dir.display(), e))?;
    output.success(format!("Cleared {} cached pages from {}", removed, dir.display()));
    Ok(())
}

fn clear_database(db_path: PathBuf, output: &Output) -> Result<()> {
    if !db_path.exists() {
        output.info("No database found to clear");
        return Ok(());
    }

    fs::remove_file(&db_path)
        .map_err(|e| eyre!("Failed to remove database at {}: {}", db_path.display(), e))?;

    // WAL mode leaves side files next to the database
    for suffix in ["-wal", "-shm"] {
        let mut side = db_path.clone().into_os_string();
        side.push(suffix);
        let side = PathBuf::from(side);
        if side.exists() {
            fs::remove_file(&side)
                .map_err(|e| eyre!("Failed to remove {}: {}", side.display(), e))?;
        }
    }

    output.success(format!("Deleted database: {}", db_path.display()));
    Ok(())
}
