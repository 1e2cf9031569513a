//! Credential commands: login, logout.

use anyhow::{Context, Result};
use console::style;
use dialoguer::Password;
use secrecy::SecretString;

use chatwire_infra::secret::{TOKEN_ENV, clear_token, store_token};

use crate::state::AppState;

/// Save a bearer token, prompting for it when not given.
pub fn login(state: &AppState, token: Option<String>, json: bool) -> Result<()> {
    let token = match token {
        Some(token) => token,
        None => Password::new()
            .with_prompt("Bearer token")
            .interact()
            .context("failed to read token")?,
    };
    let token = token.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("token must not be empty");
    }

    store_token(&state.kv, &SecretString::from(token)).context("failed to save token")?;
    tracing::info!("bearer token saved");

    if json {
        println!("{}", serde_json::json!({ "loggedIn": true }));
    } else {
        println!();
        println!(
            "  {} Token saved under {}",
            style("✓").green().bold(),
            style(state.data_dir.display()).dim()
        );
        if std::env::var(TOKEN_ENV).is_ok() {
            println!(
                "  {} {} is set and takes precedence",
                style("!").yellow().bold(),
                TOKEN_ENV
            );
        }
        println!();
    }
    Ok(())
}

/// Remove the saved token.
pub fn logout(state: &AppState, json: bool) -> Result<()> {
    clear_token(&state.kv).context("failed to remove token")?;

    if json {
        println!("{}", serde_json::json!({ "loggedIn": false }));
    } else {
        println!();
        println!("  {} Logged out", style("✓").green().bold());
        println!();
    }
    Ok(())
}
