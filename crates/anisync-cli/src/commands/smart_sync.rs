use super::AppContext;
use crate::output::Output;
use anisync_core::{read_import_file, ImportActions};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::PathBuf;

pub async fn run_smart_sync(config_path: Option<PathBuf>, file: PathBuf, output: &Output) -> Result<()> {
    let ctx = AppContext::open(config_path).await?;
    let document = read_import_file(&file, ctx.config.import.max_file_size_bytes)
        .map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?;

    let actions = ImportActions::new(ctx.store(), &ctx.config.import);
    let report = actions
        .smart_sync(&document)
        .await
        .map_err(|e| eyre!("Smart sync failed: {}", e))?;

    for category in &report.skipped_categories {
        output.warn(format!("Skipped unknown category \"{}\"", category));
    }
    if !report.unmatched.is_empty() {
        output.warn(format!("{} titles could not be matched by name", report.unmatched.len()));
    }
    if !report.not_in_catalog.is_empty() {
        output.warn(format!(
            "{} titles are not in the local catalog yet; run 'anisync scrape' or 'anisync import' to add them",
            report.not_in_catalog.len()
        ));
    }
    output.success(format!("Smart sync updated {} statuses", report.updated));
    output.report(&report);

    ctx.close().await;
    Ok(())
}
