//! Run the adapter in the foreground.

use clap::Args;
use tokio::sync::watch;

use garmin_core::error::AppError;
use garmin_sync::Adapter;

use crate::output::{self, Status};

/// Arguments for the run command
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Override the poll interval in minutes
    #[arg(short, long)]
    pub interval: Option<f64>,

    /// Also poll the ad-hoc challenge and personal record endpoints
    #[arg(long)]
    pub adhoc: bool,
}

/// Execute the run command
pub async fn execute(args: &RunArgs, config_path: &str) -> Result<(), AppError> {
    let mut config = super::load_config(config_path).await?;

    if let Some(interval) = args.interval {
        config.polling.interval_minutes = interval;
    }
    if args.adhoc {
        config.polling.adhoc = true;
    }
    config.normalize()?;

    println!("Starting Garmin Bridge adapter...");
    output::field("Account", display_account(&config.account.username));
    output::field("Interval", &format!("{} min", config.polling.interval_minutes));
    output::field("State", &config.state.path);

    let tree = super::open_tree(&config).await?;
    let adapter = Adapter::new(config, tree)?;

    // A failed start-up still runs the loop; the refresh timer retries the login.
    match adapter.on_ready().await {
        Ok(true) => output::status(Status::Done, "Adapter ready"),
        Ok(false) => output::status(
            Status::Attention,
            "MFA required. Run `garmin-cli login` or set account.mfa_code and restart",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Start-up failed");
            output::status(Status::Failed, &format!("Start-up failed: {e}"));
        }
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let runner = adapter.run(cancel_rx);
    tokio::pin!(runner);

    tokio::select! {
        _ = &mut runner => {}
        _ = shutdown_signal() => {
            println!("Shutting down...");
            let _ = cancel_tx.send(true);
            runner.await;
        }
    }

    adapter.on_unload().await;
    Ok(())
}

fn display_account(username: &str) -> &str {
    if username.is_empty() {
        "(static token)"
    } else {
        username
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
