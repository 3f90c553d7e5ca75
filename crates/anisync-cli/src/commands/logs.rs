use super::AppContext;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use anisync_models::AuditEvent;
use std::path::PathBuf;

pub async fn run_logs(config_path: Option<PathBuf>, limit: u32, output: &Output) -> Result<()> {
    let ctx = AppContext::open(config_path).await?;
    let entries = ctx
        .store()
        .recent_audit(limit)
        .await
        .map_err(|e| eyre!("Failed to read audit log: {}", e))?;

    if entries.is_empty() {
        output.info("The audit log is empty");
    } else {
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL);
        table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
        table.set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Time (UTC)").add_attribute(Attribute::Bold),
            Cell::new("Event").add_attribute(Attribute::Bold),
            Cell::new("Description").add_attribute(Attribute::Bold),
        ]);

        for entry in &entries {
            let event = match entry.event {
                AuditEvent::Error => Cell::new(entry.event).fg(Color::Red),
                AuditEvent::ApplyChange | AuditEvent::StatusUpdate => Cell::new(entry.event).fg(Color::Green),
                _ => Cell::new(entry.event).fg(Color::Cyan),
            };
            table.add_row(vec![
                Cell::new(entry.id.map(|id| id.to_string()).unwrap_or_default()),
                Cell::new(entry.created_at.format("%Y-%m-%d %H:%M:%S")),
                event,
                Cell::new(&entry.description),
            ]);
        }
        output.table(&table);
    }
    output.report(&entries);

    ctx.close().await;
    Ok(())
}
