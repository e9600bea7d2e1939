//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat, Status};
use garmin_core::config::AppConfig;
use garmin_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration (secrets masked)
    Show,
    /// Validate configuration file
    Validate,
    /// Generate a default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config/generated.toml")]
        output: String,
    },
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = masked(super::load_config(config_path).await?);
            output::print_document("config", &config, format)?;
        }
        ConfigCommand::Validate => match super::load_account_config(config_path).await {
            Ok(config) => {
                output::status(Status::Done, &format!("Configuration '{}' is valid", config_path));
                let login = if config.account.has_static_token() {
                    "static token".to_string()
                } else {
                    config.account.username.clone()
                };
                output::field("Login", &login);
                output::field("SSO", &config.api.sso_url);
                output::field("API", &config.api.api_url);
                output::field(
                    "Interval",
                    &format!("{} min", config.polling.interval_minutes),
                );
                output::field("State", &config.state.path);
            }
            Err(e) => {
                output::status(Status::Failed, &format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
        ConfigCommand::Generate { output: out_path } => {
            let default_config = include_str!("../../../../config/default.toml");

            if let Some(parent) = std::path::Path::new(out_path).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| AppError::internal(format!("Failed to create dir: {}", e)))?;
            }

            tokio::fs::write(out_path, default_config)
                .await
                .map_err(|e| AppError::internal(format!("Failed to write config: {}", e)))?;

            output::status(Status::Done, &format!("Default config written to '{}'", out_path));
        }
    }

    Ok(())
}

/// Replace every secret with a placeholder before printing.
fn masked(mut config: AppConfig) -> AppConfig {
    let mask = |value: &mut Option<String>| {
        if value.is_some() {
            *value = Some("****".to_string());
        }
    };

    if !config.account.password.is_empty() {
        config.account.password = "****".to_string();
    }
    mask(&mut config.account.mfa_code);
    mask(&mut config.account.token);
    mask(&mut config.api.consumer_secret);
    config
}
