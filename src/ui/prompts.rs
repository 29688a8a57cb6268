//! Confirmation prompt with CI fallback

use super::context::UiContext;
use crate::error::{ShellcacheError, ShellcacheResult};

/// Ask for confirmation.
///
/// `-y` answers yes; a non-interactive session gets `default`.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> ShellcacheResult<bool> {
    if ctx.auto_yes() {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }

    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| ShellcacheError::User(format!("Prompt task failed: {}", e)))?
    .map_err(|e| ShellcacheError::User(format!("Prompt failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn confirm_auto_yes() {
        let ctx = UiContext::non_interactive().with_auto_yes(true);
        assert!(confirm(&ctx, "Delete 2 generations?", false).await.unwrap());
    }

    #[tokio::test]
    async fn confirm_non_interactive_default() {
        let ctx = UiContext::non_interactive();
        assert!(confirm(&ctx, "Delete?", true).await.unwrap());
        assert!(!confirm(&ctx, "Delete?", false).await.unwrap());
    }
}
