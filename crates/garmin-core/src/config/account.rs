//! Garmin account configuration.

use serde::{Deserialize, Serialize};

/// Credentials for the Garmin Connect account being mirrored.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Garmin Connect login (usually an e-mail address).
    #[serde(default)]
    pub username: String,
    /// Garmin Connect password.
    #[serde(default)]
    pub password: String,
    /// One-shot multi-factor code. Consumed by the next login attempt.
    #[serde(default)]
    pub mfa_code: Option<String>,
    /// Static OAuth2 access token. When set, the SSO login is skipped.
    #[serde(default)]
    pub token: Option<String>,
}

impl AccountConfig {
    /// Whether both username and password are present.
    pub fn has_credentials(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }

    /// Whether a non-empty static token is configured.
    pub fn has_static_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("username", &self.username)
            .field("password", &"****")
            .field("mfa_code", &self.mfa_code.as_ref().map(|_| "****"))
            .field("token", &self.token.as_ref().map(|_| "****"))
            .finish()
    }
}
