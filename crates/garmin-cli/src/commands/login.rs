//! Interactive login.

use std::sync::Arc;

use clap::Args;

use garmin_auth::{LoginOutcome, SessionManager};
use garmin_core::config::AppConfig;
use garmin_core::error::AppError;

use crate::output::{self, Status};

/// Arguments for the login command
#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Username (defaults to the configured one, prompts if missing)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Password (prompts if not configured)
    #[arg(short, long)]
    pub password: Option<String>,

    /// MFA code (prompts when the account asks for one)
    #[arg(short, long)]
    pub mfa_code: Option<String>,

    /// Log in again even if a session is persisted
    #[arg(long)]
    pub force: bool,
}

/// Execute the login command
pub async fn execute(args: &LoginArgs, config_path: &str) -> Result<(), AppError> {
    let mut config = super::load_config(config_path).await?;
    fill_credentials(&mut config, args)?;
    config.normalize()?;

    let tree = super::open_tree(&config).await?;
    let session = SessionManager::new(&config, Arc::clone(&tree))?;

    if !args.force && session.restore().await? {
        output::status(Status::Done, "A persisted session is already available");
        println!("  Use --force to log in again.");
        return Ok(());
    }

    if let Some(code) = &args.mfa_code {
        session.set_mfa_code(code.clone()).await;
    }

    if session.login().await? == LoginOutcome::MfaRequired {
        let code: String = dialoguer::Input::new()
            .with_prompt("MFA code")
            .interact_text()
            .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;
        session.submit_mfa(&code).await?;
    }

    tree.flush().await?;

    output::status(Status::Done, "Logged in to Garmin Connect");
    if let Some(bundle) = session.bundle().await {
        if bundle.oauth2.expires_at > 0 {
            let expires = super::session::format_timestamp(bundle.oauth2.expires_at);
            output::field("Token expires", &expires);
        }
        output::field("Refreshable", if bundle.can_refresh() { "yes" } else { "no" });
    }
    Ok(())
}

/// Take credentials from the arguments, then the config, then a prompt.
fn fill_credentials(config: &mut AppConfig, args: &LoginArgs) -> Result<(), AppError> {
    if config.account.has_static_token() {
        return Ok(());
    }

    if let Some(username) = &args.username {
        config.account.username = username.clone();
    }
    if config.account.username.trim().is_empty() {
        config.account.username = dialoguer::Input::new()
            .with_prompt("Garmin username")
            .interact_text()
            .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;
    }

    if let Some(password) = &args.password {
        config.account.password = password.clone();
    }
    if config.account.password.is_empty() {
        config.account.password = dialoguer::Password::new()
            .with_prompt("Garmin password")
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;
    }

    Ok(())
}
