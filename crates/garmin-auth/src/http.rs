//! HTTP client construction.

use std::time::Duration;

use garmin_core::config::api::ApiConfig;
use garmin_core::error::{AppError, ErrorKind};
use garmin_core::result::AppResult;

use crate::cookies::PersistentCookieJar;

/// Client for the SSO pages: browser user agent, shared cookie jar.
pub fn sso_client(api: &ApiConfig, jar: &PersistentCookieJar) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(api.browser_user_agent.as_str())
        .cookie_provider(jar.provider())
        .timeout(Duration::from_secs(api.timeout_seconds))
        .build()
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Failed to build SSO client", e))
}

/// Client for the OAuth and data endpoints: app user agent, no cookies.
pub fn api_client(api: &ApiConfig) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(api.app_user_agent.as_str())
        .timeout(Duration::from_secs(api.timeout_seconds))
        .build()
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Failed to build API client", e))
}
