use super::AppContext;
use crate::output::Output;
use anisync_core::{ImportActions, ImportError};
use anisync_models::WatchStatus;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde_json::json;
use std::path::PathBuf;

/// Accepts `completed`, `on-hold`, `ON_HOLD` and so on
pub fn parse_status(value: &str) -> Result<WatchStatus, String> {
    value.trim().to_uppercase().replace(['-', ' '], "_").parse()
}

fn describe(err: ImportError) -> color_eyre::Report {
    match err {
        ImportError::NotInCatalog(id) => eyre!(
            "ID {} is not in the catalog; run 'anisync scrape' or import it first",
            id
        ),
        other => eyre!("{}", other),
    }
}

pub async fn run_set(config_path: Option<PathBuf>, id: i64, status: WatchStatus, output: &Output) -> Result<()> {
    let ctx = AppContext::open(config_path).await?;
    let actions = ImportActions::new(ctx.store(), &ctx.config.import);
    actions.set_status(id, status).await.map_err(describe)?;

    output.success(format!("Set status of ID {} to {}", id, status));
    output.report(&json!({ "id": id, "status": status }));
    ctx.close().await;
    Ok(())
}

pub async fn run_remove(config_path: Option<PathBuf>, id: i64, output: &Output) -> Result<()> {
    let ctx = AppContext::open(config_path).await?;
    let actions = ImportActions::new(ctx.store(), &ctx.config.import);
    actions.remove_from_library(id).await.map_err(describe)?;

    output.success(format!("Removed ID {} from library", id));
    output.report(&json!({ "id": id, "status": null }));
    ctx.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_is_lenient_about_case_and_separators() {
        assert_eq!(parse_status("completed").unwrap(), WatchStatus::Completed);
        assert_eq!(parse_status("on-hold").unwrap(), WatchStatus::OnHold);
        assert_eq!(parse_status("to watch").unwrap(), WatchStatus::ToWatch);
        assert_eq!(parse_status("DROPPED").unwrap(), WatchStatus::Dropped);
    }

    #[test]
    fn test_parse_status_rejects_unknown_values() {
        assert!(parse_status("watching").is_err());
        assert!(parse_status("").is_err());
    }
}
