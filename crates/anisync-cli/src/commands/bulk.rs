use super::progress::PipelineUI;
use super::{prompts, AppContext};
use crate::output::Output;
use anisync_core::{read_import_file, status_map, BulkSync, FullSyncOptions, RawPageCache};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run_scrape(
    config_path: Option<PathBuf>,
    export: Option<PathBuf>,
    resume: bool,
    max_pages: Option<u32>,
    output: &Output,
) -> Result<()> {
    let ctx = AppContext::open(config_path).await?;

    let statuses = match &export {
        Some(path) => {
            let document = read_import_file(path, ctx.config.import.max_file_size_bytes)
                .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
            let map = status_map(&document);
            output.info(format!("Loaded {} watch statuses from {}", map.len(), path.display()));
            Some(map)
        }
        None => None,
    };

    let mut bulk_config = ctx.config.bulk.clone();
    if max_pages.is_some() {
        bulk_config.max_pages = max_pages;
    }

    let cache = RawPageCache::new(&ctx.paths)
        .map_err(|e| eyre!("Failed to open page cache at {}: {}", ctx.paths.raw_page_dir().display(), e))?;

    let ui = PipelineUI::spinner("Syncing catalog", output.is_quiet());
    let sync = BulkSync::new(ctx.store(), Arc::new(ctx.catalog_client()?), cache, bulk_config)
        .with_progress(ui.callback());

    let report = sync
        .run_full_sync(&FullSyncOptions { resume, statuses })
        .await
        .map_err(|e| eyre!("Full sync failed: {}", e))?;
    ui.finish("Catalog sync finished");

    match &report.halted {
        Some(reason) => {
            output.warn(format!(
                "Sync halted: {}. {} entries saved from {} pages; run 'anisync scrape --resume' to continue",
                reason, report.success, report.pages_fetched
            ));
        }
        None => {
            output.success(format!(
                "Synced {} catalog entries from {} pages",
                report.success, report.pages_fetched
            ));
        }
    }
    if report.failures > 0 {
        output.warn(format!("{} pages failed and were skipped", report.failures));
    }
    if report.statuses_applied > 0 {
        output.info(format!("Applied {} watch statuses", report.statuses_applied));
    }
    output.report(&report);

    ctx.close().await;
    Ok(())
}

pub async fn run_ingest(config_path: Option<PathBuf>, file: PathBuf, yes: bool, output: &Output) -> Result<()> {
    let ctx = AppContext::open(config_path).await?;
    let document = read_import_file(&file, ctx.config.import.max_file_size_bytes)
        .map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?;

    if !prompts::confirm("Ingesting replaces the whole watch-list. Continue?", yes)? {
        output.info("Ingest cancelled, nothing was changed");
        ctx.close().await;
        return Ok(());
    }

    let cache = RawPageCache::new(&ctx.paths)
        .map_err(|e| eyre!("Failed to open page cache at {}: {}", ctx.paths.raw_page_dir().display(), e))?;

    let ui = PipelineUI::bar(0, "Ingesting", output.is_quiet());
    let sync = BulkSync::new(ctx.store(), Arc::new(ctx.catalog_client()?), cache, ctx.config.bulk.clone())
        .with_progress(ui.callback());

    let report = sync
        .run_ingest(&document)
        .await
        .map_err(|e| eyre!("Ingest failed: {}", e))?;
    ui.finish("Ingest finished");

    if report.failures == 0 {
        output.success(format!("Ingested {} of {} titles", report.success, report.queued));
    } else {
        output.warn(format!(
            "Ingested {} of {} titles, {} failed",
            report.success, report.queued, report.failures
        ));
    }
    if report.rate_limit_hits > 0 {
        output.info(format!("Rate limited {} times", report.rate_limit_hits));
    }
    output.report(&report);

    ctx.close().await;
    Ok(())
}
