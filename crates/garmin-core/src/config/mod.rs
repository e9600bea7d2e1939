//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate, overlaid with `GARMIN__SECTION__KEY` environment
//! variables. Each sub-module represents a logical configuration section.

pub mod account;
pub mod api;
pub mod logging;
pub mod polling;
pub mod state;

use serde::{Deserialize, Serialize};

pub use self::account::AccountConfig;
pub use self::api::ApiConfig;
pub use self::logging::LoggingConfig;
pub use self::polling::PollingConfig;
pub use self::state::StateConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// One instance of the adapter is configured by one of these: the Garmin
/// account, the remote endpoints, the polling cadence, where the state tree
/// lives, and how to log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Garmin account credentials.
    #[serde(default)]
    pub account: AccountConfig,
    /// Remote SSO / API endpoints.
    #[serde(default)]
    pub api: ApiConfig,
    /// Polling and refresh cadence.
    #[serde(default)]
    pub polling: PollingConfig,
    /// State tree location.
    #[serde(default)]
    pub state: StateConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// The file is optional so that a purely environment-driven deployment
    /// works; environment variables prefixed with `GARMIN__` override it.
    pub fn load(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("GARMIN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Validate the loaded configuration and clamp out-of-range values.
    ///
    /// The poll interval must be a finite number; it is clamped to
    /// [`polling::MIN_INTERVAL_MINUTES`]..=[`polling::MAX_INTERVAL_MINUTES`].
    /// Either a username and password or a static token is required.
    pub fn normalize(&mut self) -> Result<(), AppError> {
        if !self.polling.interval_minutes.is_finite() {
            return Err(AppError::configuration(format!(
                "Poll interval must be a number of minutes, got {}",
                self.polling.interval_minutes
            )));
        }
        if self.polling.interval_minutes > polling::MAX_INTERVAL_MINUTES {
            tracing::info!(
                "Set interval to maximum {}",
                polling::MAX_INTERVAL_MINUTES
            );
            self.polling.interval_minutes = polling::MAX_INTERVAL_MINUTES;
        }
        if self.polling.interval_minutes < polling::MIN_INTERVAL_MINUTES {
            tracing::info!(
                "Set interval to minimum {}",
                polling::MIN_INTERVAL_MINUTES
            );
            self.polling.interval_minutes = polling::MIN_INTERVAL_MINUTES;
        }

        if !self.account.has_credentials() && !self.account.has_static_token() {
            return Err(AppError::configuration(
                "Please set username and password in the instance settings",
            ));
        }

        Ok(())
    }
}
