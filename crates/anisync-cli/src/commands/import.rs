use super::progress::PipelineUI;
use super::{prompts, AppContext};
use crate::output::Output;
use anisync_core::{ChangeApplier, ImportActions, ScanReport};
use anisync_models::ChangeKind;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn changes_table(report: &ScanReport) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table.set_header(vec![
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("Kind").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Changes").add_attribute(Attribute::Bold),
    ]);

    for change in &report.changes {
        let kind = match change.kind {
            ChangeKind::New => Cell::new(change.kind).fg(Color::Green),
            ChangeKind::StatusChange => Cell::new(change.kind).fg(Color::Yellow),
            _ => Cell::new(change.kind),
        };
        table.add_row(vec![
            Cell::new(change.external_id),
            kind,
            Cell::new(&change.title),
            Cell::new(change.changes.join("\n")),
        ]);
    }
    table
}

fn print_scan(report: &ScanReport, output: &Output) {
    if !report.changes.is_empty() {
        output.table(&changes_table(report));
    }

    for record in &report.unresolved {
        output.warn(format!("Could not resolve \"{}\" ({})", record.name, record.category));
    }

    let new = report.changes.iter().filter(|c| c.kind == ChangeKind::New).count();
    output.info(format!(
        "Scanned {}: {} changes ({} new, {} status changes), {} unresolved",
        report.file_name,
        report.changes.len(),
        new,
        report.changes.len() - new,
        report.unresolved.len()
    ));
}

async fn scan(ctx: &AppContext, file: &Path) -> Result<ScanReport> {
    let actions = ImportActions::new(ctx.store(), &ctx.config.import);
    actions
        .scan_file(file)
        .await
        .map_err(|e| eyre!("Failed to scan {}: {}", file.display(), e))
}

pub async fn run_scan(config_path: Option<PathBuf>, file: PathBuf, output: &Output) -> Result<()> {
    let ctx = AppContext::open(config_path).await?;
    let report = scan(&ctx, &file).await?;

    print_scan(&report, output);
    output.report(&report);

    ctx.close().await;
    Ok(())
}

pub async fn run_import(config_path: Option<PathBuf>, file: PathBuf, yes: bool, output: &Output) -> Result<()> {
    let ctx = AppContext::open(config_path).await?;
    let report = scan(&ctx, &file).await?;
    print_scan(&report, output);

    if report.changes.is_empty() {
        output.success("Library is already up to date");
        output.report(&json!({ "scan": report, "applied": 0, "failed": 0 }));
        ctx.close().await;
        return Ok(());
    }

    if !prompts::confirm(&format!("Apply {} changes?", report.changes.len()), yes)? {
        output.info("Import cancelled, nothing was changed");
        ctx.close().await;
        return Ok(());
    }

    let applier = ChangeApplier::new(ctx.store(), Arc::new(ctx.catalog_client()?));
    let ui = PipelineUI::spinner(&format!("Applying {} changes", report.changes.len()), output.is_quiet());
    let summary = applier.apply_all(&report.changes).await;
    ui.finish("Import finished");

    for failure in &summary.errors {
        output.error(format!("{} (ID {}): {}", failure.title, failure.external_id, failure.error));
    }
    if summary.failed == 0 {
        output.success(format!("Applied {} changes", summary.applied));
    } else {
        output.warn(format!("Applied {} changes, {} failed", summary.applied, summary.failed));
    }
    output.report(&json!({ "scan": report, "summary": summary }));

    ctx.close().await;
    Ok(())
}
