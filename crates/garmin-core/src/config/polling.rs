//! Polling and token refresh cadence.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Smallest accepted poll interval, in minutes.
pub const MIN_INTERVAL_MINUTES: f64 = 0.5;

/// Largest accepted poll interval, in minutes (one week).
pub const MAX_INTERVAL_MINUTES: f64 = 10_080.0;

/// How often data is mirrored and how failures are retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Minutes between two polls of the data endpoints.
    #[serde(default = "default_interval")]
    pub interval_minutes: f64,
    /// Also poll the ad-hoc challenge and personal record endpoints.
    #[serde(default)]
    pub adhoc: bool,
    /// Delay before refreshing the token after a 401.
    #[serde(default = "default_unauthorized_retry")]
    pub unauthorized_retry_seconds: u64,
    /// Refresh interval used when the token does not state its lifetime.
    #[serde(default = "default_token_lifetime")]
    pub default_token_lifetime_seconds: u64,
    /// Delay before re-polling after a command was written to the state tree.
    #[serde(default = "default_command_delay")]
    pub command_delay_seconds: u64,
}

impl PollingConfig {
    /// The poll interval as a [`Duration`].
    ///
    /// Out-of-range values are clamped; a non-finite value falls back to the default.
    pub fn interval(&self) -> Duration {
        let minutes = if self.interval_minutes.is_finite() {
            self.interval_minutes
                .clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES)
        } else {
            default_interval()
        };
        Duration::from_secs_f64(minutes * 60.0)
    }

    /// The 401 retry delay as a [`Duration`].
    pub fn unauthorized_retry(&self) -> Duration {
        Duration::from_secs(self.unauthorized_retry_seconds)
    }

    /// The command re-poll delay as a [`Duration`].
    pub fn command_delay(&self) -> Duration {
        Duration::from_secs(self.command_delay_seconds)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval(),
            adhoc: false,
            unauthorized_retry_seconds: default_unauthorized_retry(),
            default_token_lifetime_seconds: default_token_lifetime(),
            command_delay_seconds: default_command_delay(),
        }
    }
}

fn default_interval() -> f64 {
    10.0
}

fn default_unauthorized_retry() -> u64 {
    60
}

fn default_token_lifetime() -> u64 {
    3600
}

fn default_command_delay() -> u64 {
    10
}
