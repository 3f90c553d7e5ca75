use color_eyre::eyre::eyre;
use color_eyre::Result;
use dialoguer::Confirm;

use super::progress::is_interactive;

/// Ask for confirmation; `assume_yes` answers without a prompt
///
/// Errors when no terminal is attached, so scripted runs must pass `--yes`.
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !is_interactive() {
        return Err(eyre!("Refusing to continue without a terminal; pass --yes to confirm"));
    }

    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| eyre!("Failed to read confirmation: {}", e))
}
