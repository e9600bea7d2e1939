//! Garmin Bridge daemon
//!
//! Main entry point that loads the configuration, opens the state tree and
//! runs the adapter until shutdown.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use garmin_core::config::AppConfig;
use garmin_core::error::AppError;
use garmin_core::traits::state::StateTree;
use garmin_state::FileStateTree;
use garmin_sync::Adapter;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Adapter error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("GARMIN_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

    let mut config = AppConfig::load(&config_path)?;
    config.normalize()?;
    Ok(config)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main adapter run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        namespace = %config.state.namespace,
        "Starting Garmin Bridge v{}",
        env!("CARGO_PKG_VERSION")
    );

    // ── Step 1: Open the state tree ──────────────────────────────
    tracing::info!("Opening state tree at '{}'", config.state.path);
    let tree: Arc<dyn StateTree> = Arc::new(FileStateTree::open(&config.state.path).await?);

    // ── Step 2: Build the adapter ────────────────────────────────
    let adapter = Arc::new(Adapter::new(config, tree)?);

    // ── Step 3: Log in and poll once ─────────────────────────────
    match adapter.on_ready().await {
        Ok(true) => tracing::info!("Adapter ready"),
        Ok(false) => tracing::warn!("Adapter waiting for an MFA code"),
        Err(e) => tracing::error!("Start-up failed: {}", e),
    }

    // ── Step 4: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 5: Start the adapter loop ───────────────────────────
    let runner = Arc::clone(&adapter);
    let handle = tokio::spawn(async move {
        runner.run(shutdown_rx).await;
    });

    // ── Step 6: Wait for shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping adapter...");

    let _ = shutdown_tx.send(true);
    if let Err(e) = handle.await {
        tracing::error!("Adapter task failed: {}", e);
    }

    adapter.on_unload().await;
    tracing::info!("Garmin Bridge stopped");
    Ok(())
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
