//! State tree inspection commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use garmin_core::error::AppError;
use garmin_core::types::state::State;

use crate::output::{self, OutputFormat};

/// Ids whose values are secrets and are never printed.
const REDACTED: [&str; 2] = [garmin_state::keys::AUTH_SESSION, garmin_state::keys::AUTH_COOKIE];

/// Arguments for state commands
#[derive(Debug, Args)]
pub struct StateArgs {
    /// State subcommand
    #[command(subcommand)]
    pub command: StateCommand,
}

/// State subcommands
#[derive(Debug, Subcommand)]
pub enum StateCommand {
    /// List states, optionally under a prefix
    List {
        /// Id prefix such as `usersummary` or `devices.3345678`
        prefix: Option<String>,
    },
    /// Show one state
    Get {
        /// Full state id
        id: String,
    },
}

/// State display row
#[derive(Debug, Serialize, Tabled)]
struct StateRow {
    /// State id
    id: String,
    /// Value
    value: String,
    /// Acknowledged
    ack: String,
    /// Last write
    updated: String,
}

impl StateRow {
    fn new(id: String, state: &State) -> Self {
        let value = if REDACTED.contains(&id.as_str()) {
            "****".to_string()
        } else {
            match &state.val {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        };
        Self {
            id,
            value,
            ack: if state.ack { "✓" } else { "✗" }.to_string(),
            updated: state.ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Execute state commands
pub async fn execute(
    args: &StateArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path).await?;
    let tree = super::open_tree(&config).await?;

    match &args.command {
        StateCommand::List { prefix } => {
            let states = tree.list(prefix.as_deref().unwrap_or_default()).await?;
            let rows: Vec<StateRow> = states
                .iter()
                .map(|(id, state)| StateRow::new(id.clone(), state))
                .collect();
            output::print_rows(&rows, "No states found.", format)?;
        }
        StateCommand::Get { id } => {
            let state = tree
                .get_state(id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("State '{}' not found", id)))?;
            output::print_rows(&[StateRow::new(id.clone(), &state)], "", format)?;
        }
    }

    Ok(())
}
