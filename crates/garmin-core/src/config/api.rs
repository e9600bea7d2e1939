//! Remote endpoint configuration.

use serde::{Deserialize, Serialize};

/// Base URLs and client identity used to talk to Garmin.
///
/// The defaults point at the production services; tests point them at a
/// local mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// SSO host serving the sign-in widget.
    #[serde(default = "default_sso_url")]
    pub sso_url: String,
    /// Connect API host (OAuth endpoints and data services).
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Where to fetch the OAuth1 consumer key pair from.
    #[serde(default = "default_consumer_url")]
    pub consumer_url: String,
    /// OAuth1 consumer key override.
    #[serde(default)]
    pub consumer_key: Option<String>,
    /// OAuth1 consumer secret override.
    #[serde(default)]
    pub consumer_secret: Option<String>,
    /// Browser user agent presented to the SSO pages.
    #[serde(default = "default_browser_user_agent")]
    pub browser_user_agent: String,
    /// User agent presented to the OAuth and data endpoints.
    #[serde(default = "default_app_user_agent")]
    pub app_user_agent: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            sso_url: default_sso_url(),
            api_url: default_api_url(),
            consumer_url: default_consumer_url(),
            consumer_key: None,
            consumer_secret: None,
            browser_user_agent: default_browser_user_agent(),
            app_user_agent: default_app_user_agent(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_sso_url() -> String {
    "https://sso.garmin.com".to_string()
}

fn default_api_url() -> String {
    "https://connectapi.garmin.com".to_string()
}

fn default_consumer_url() -> String {
    "https://thegarth.s3.amazonaws.com/oauth_consumer.json".to_string()
}

fn default_browser_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Safari/605.1.15".to_string()
}

fn default_app_user_agent() -> String {
    "com.garmin.android.apps.connectmobile".to_string()
}

fn default_timeout() -> u64 {
    30
}
