use super::{config_file, load_config};
use crate::output::Output;
use crate::ConfigCommands;
use anisync_config::{Config, PathManager};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use std::path::PathBuf;

pub(crate) fn run_config(config_path: Option<PathBuf>, cmd: ConfigCommands, output: &Output) -> Result<()> {
    let path_manager = PathManager::default();
    match cmd {
        ConfigCommands::Show => show_config(&path_manager, config_path, output),
        ConfigCommands::Init { force } => init_config(&path_manager, config_path, force, output),
    }
}

fn section(table: &mut Table, title: &str) {
    table.add_row(vec![Cell::new(title)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)]);
}

fn show_config(path_manager: &PathManager, config_path: Option<PathBuf>, output: &Output) -> Result<()> {
    let file = config_file(path_manager, config_path.as_deref());
    let config = load_config(path_manager, config_path.as_deref())?;

    if !file.exists() {
        output.warn(format!("No config file at {}; showing defaults", file.display()));
        output.info("Run 'anisync config init' to write one.");
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table.set_header(vec![
        Cell::new("Setting").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);

    table.add_row(vec![Cell::new("Config file"), Cell::new(file.display())]);
    table.add_row(vec![
        Cell::new("Database"),
        Cell::new(config.database_path(path_manager).display()),
    ]);
    table.add_row(vec![Cell::new("Page cache"), Cell::new(path_manager.raw_page_dir().display())]);
    table.add_row(vec![Cell::new("Logs"), Cell::new(path_manager.log_file().display())]);

    section(&mut table, "Catalog");
    table.add_row(vec![Cell::new("endpoint"), Cell::new(&config.catalog.endpoint)]);
    table.add_row(vec![
        Cell::new("request_timeout_secs"),
        Cell::new(config.catalog.request_timeout_secs),
    ]);
    table.add_row(vec![Cell::new("user_agent"), Cell::new(&config.catalog.user_agent)]);

    section(&mut table, "Import");
    table.add_row(vec![
        Cell::new("max_file_size_bytes"),
        Cell::new(config.import.max_file_size_bytes),
    ]);

    section(&mut table, "Bulk");
    let bulk = &config.bulk;
    table.add_row(vec![Cell::new("page_size"), Cell::new(bulk.page_size)]);
    table.add_row(vec![Cell::new("concurrency"), Cell::new(bulk.concurrency)]);
    table.add_row(vec![Cell::new("page_delay_ms"), Cell::new(bulk.page_delay_ms)]);
    table.add_row(vec![
        Cell::new("rate_limit_backoff_secs"),
        Cell::new(bulk.rate_limit_backoff_secs),
    ]);
    table.add_row(vec![
        Cell::new("max_rate_limit_retries"),
        Cell::new(bulk.max_rate_limit_retries),
    ]);
    table.add_row(vec![Cell::new("ingest_batch_size"), Cell::new(bulk.ingest_batch_size)]);
    table.add_row(vec![Cell::new("ingest_delay_ms"), Cell::new(bulk.ingest_delay_ms)]);
    table.add_row(vec![
        Cell::new("max_pages"),
        Cell::new(bulk.max_pages.map(|p| p.to_string()).unwrap_or_else(|| "unlimited".to_string())),
    ]);

    output.table(&table);
    output.report(&config);
    Ok(())
}

fn init_config(path_manager: &PathManager, config_path: Option<PathBuf>, force: bool, output: &Output) -> Result<()> {
    let file = config_file(path_manager, config_path.as_deref());
    if file.exists() && !force {
        output.warn(format!("Config file already exists at {}", file.display()));
        output.info("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    Config::default()
        .save_to_file(&file)
        .map_err(|e| eyre!("Failed to write config to {}: {}", file.display(), e))?;
    path_manager
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create data directories: {}", e))?;

    output.success(format!("Wrote default configuration to {}", file.display()));
    Ok(())
}
