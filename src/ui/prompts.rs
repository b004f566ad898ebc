//! Confirmation prompt with CI fallback

use super::context::UiContext;
use crate::error::{DockstashError, DockstashResult};

/// Ask for confirmation; returns `default` when nobody can answer
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> DockstashResult<bool> {
    if ctx.auto_yes() {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }

    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    let answer = tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message).initial_value(default).interact()
    })
    .await
    .map_err(|e| DockstashError::User(format!("Prompt task failed: {}", e)))?;

    answer.map_err(|e| DockstashError::User(format!("Prompt failed: {}", e)))
}
