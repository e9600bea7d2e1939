//! One-shot synchronisation.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use garmin_core::error::AppError;
use garmin_sync::Adapter;

use crate::output::{self, OutputFormat, Status};

/// Arguments for the sync command
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Also poll the ad-hoc challenge and personal record endpoints
    #[arg(long)]
    pub adhoc: bool,
}

/// One row of the sync summary
#[derive(Debug, Serialize, Tabled)]
struct DeviceRow {
    /// Unit id
    unit_id: String,
    /// Product name
    name: String,
}

/// Poll summary
#[derive(Debug, Serialize)]
struct SyncSummary {
    devices: Vec<DeviceRow>,
    updated: usize,
    empty: usize,
    failed: usize,
    unauthorized: bool,
}

/// Execute the sync command
pub async fn execute(
    args: &SyncArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let mut config = super::load_account_config(config_path).await?;
    if args.adhoc {
        config.polling.adhoc = true;
    }

    let tree = super::open_tree(&config).await?;
    let adapter = Adapter::new(config, tree)?;

    // on_ready polls once; a second update would hit every endpoint twice.
    if !adapter.on_ready().await? {
        output::status(Status::Attention, "MFA required. Run `garmin-cli login` first");
        adapter.on_unload().await;
        return Ok(());
    }
    let report = adapter.last_report().await;
    adapter.on_unload().await;

    let devices: Vec<DeviceRow> = adapter
        .devices()
        .ids()
        .into_iter()
        .map(|unit_id| DeviceRow {
            name: adapter.devices().name(&unit_id).unwrap_or_default(),
            unit_id,
        })
        .collect();

    match format {
        OutputFormat::Table => {
            output::print_rows(&devices, "No devices registered.", format)?;
            output::field("Endpoints updated", &report.updated.to_string());
            output::field("Endpoints empty", &report.empty.to_string());
            output::field("Endpoints failed", &report.failed.to_string());
            if report.unauthorized {
                output::status(Status::Attention, "Some endpoints rejected the token");
            } else {
                output::status(Status::Done, "Sync finished");
            }
        }
        OutputFormat::Json => {
            let summary = SyncSummary {
                devices,
                updated: report.updated,
                empty: report.empty,
                failed: report.failed,
                unauthorized: report.unauthorized,
            };
            output::print_document("sync", &summary, format)?;
        }
    }
    Ok(())
}
