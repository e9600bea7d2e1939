//! CLI command definitions and dispatch.

pub mod config;
pub mod login;
pub mod run;
pub mod session;
pub mod state;
pub mod sync;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use garmin_core::config::AppConfig;
use garmin_core::error::AppError;
use garmin_core::traits::state::StateTree;
use garmin_state::FileStateTree;

/// Garmin Bridge: mirror a Garmin Connect account into a state tree
#[derive(Debug, Parser)]
#[command(name = "garmin-cli", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the adapter until interrupted
    Run(run::RunArgs),
    /// Log in interactively and persist the session
    Login(login::LoginArgs),
    /// Log in or restore, discover devices and poll once
    Sync(sync::SyncArgs),
    /// Inspect or clear the persisted session
    Session(session::SessionArgs),
    /// Inspect the state tree
    State(state::StateArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Run(args) => run::execute(args, &self.config).await,
            Commands::Login(args) => login::execute(args, &self.config).await,
            Commands::Sync(args) => sync::execute(args, &self.config, self.format).await,
            Commands::Session(args) => session::execute(args, &self.config, self.format).await,
            Commands::State(args) => state::execute(args, &self.config, self.format).await,
            Commands::Config(args) => config::execute(args, &self.config, self.format).await,
        }
    }
}

/// Helper: load configuration from file
pub async fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
        .map_err(|e| AppError::configuration(format!("Failed to load config: {}", e)))
}

/// Helper: load configuration and check it is complete enough to log in
pub async fn load_account_config(config_path: &str) -> Result<AppConfig, AppError> {
    let mut config = load_config(config_path).await?;
    config.normalize()?;
    Ok(config)
}

/// Helper: open the file-backed state tree named by the config
pub async fn open_tree(config: &AppConfig) -> Result<Arc<dyn StateTree>, AppError> {
    let tree = FileStateTree::open(&config.state.path).await?;
    Ok(Arc::new(tree))
}
