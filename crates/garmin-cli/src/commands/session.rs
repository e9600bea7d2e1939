//! Persisted session commands.

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;

use garmin_auth::session::SessionStore;
use garmin_core::error::AppError;

use crate::output::{self, OutputFormat, Status};

/// Arguments for session commands
#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Session subcommand
    #[command(subcommand)]
    pub command: SessionCommand,
}

/// Session subcommands
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Show the persisted token bundle
    Show,
    /// Forget the persisted session and cookies
    Clear {
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

/// What `session show` prints. Never carries token material.
#[derive(Debug, Serialize)]
struct SessionInfo {
    created_at: String,
    token_type: String,
    scope: String,
    expires_at: String,
    expired: bool,
    refreshable: bool,
    mfa_token: bool,
    cookies: bool,
}

/// Execute session commands
pub async fn execute(
    args: &SessionArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path).await?;
    let tree = super::open_tree(&config).await?;
    let store = SessionStore::new(tree.clone());

    match &args.command {
        SessionCommand::Show => {
            let Some(bundle) = store.load_bundle().await? else {
                output::status(Status::Attention, "No persisted session");
                return Ok(());
            };
            let cookies = store.load_cookies().await?.is_some();

            let info = SessionInfo {
                created_at: bundle.created_at.to_rfc3339(),
                token_type: bundle.oauth2.token_type.clone(),
                scope: bundle.oauth2.scope.clone(),
                expires_at: format_timestamp(bundle.oauth2.expires_at),
                expired: bundle.oauth2.is_expired(Utc::now()),
                refreshable: bundle.can_refresh(),
                mfa_token: bundle
                    .oauth1
                    .as_ref()
                    .is_some_and(|t| t.mfa_token.is_some()),
                cookies,
            };

            match format {
                OutputFormat::Table => {
                    output::field("Created", &info.created_at);
                    output::field("Token type", &info.token_type);
                    output::field("Scope", &info.scope);
                    output::field("Expires", &info.expires_at);
                    output::field("Expired", yes_no(info.expired));
                    output::field("Refreshable", yes_no(info.refreshable));
                    output::field("MFA token", yes_no(info.mfa_token));
                    output::field("Cookies", yes_no(info.cookies));
                }
                OutputFormat::Json => output::print_document("session", &info, format)?,
            }
        }
        SessionCommand::Clear { force } => {
            if !force {
                let confirm = dialoguer::Confirm::new()
                    .with_prompt("Forget the persisted Garmin session?")
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;

                if !confirm {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            store.clear().await?;
            store.set_connection(false).await?;
            tree.flush().await?;
            output::status(Status::Done, "Session cleared");
        }
    }

    Ok(())
}

/// Render a unix timestamp, or "never" for tokens without an expiry.
pub fn format_timestamp(secs: i64) -> String {
    if secs <= 0 {
        return "never".to_string();
    }
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
