//! Token types exchanged with the OAuth service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use garmin_core::error::{AppError, ErrorKind};
use garmin_core::result::AppResult;

/// OAuth1 consumer key pair identifying the mobile app.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    /// Consumer key.
    pub consumer_key: String,
    /// Consumer secret.
    pub consumer_secret: String,
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"****")
            .finish()
    }
}

/// Long-lived OAuth1 token obtained from a service ticket.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth1Token {
    /// Token key.
    pub oauth_token: String,
    /// Token secret.
    pub oauth_token_secret: String,
    /// MFA token to pass along with every exchange, when the login used MFA.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_token: Option<String>,
    /// Expiry of the MFA token, as returned by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_expiration_timestamp: Option<String>,
}

impl OAuth1Token {
    /// Parse the `application/x-www-form-urlencoded` body of the preauthorize call.
    pub fn from_form(body: &str) -> AppResult<Self> {
        let form: PreauthorizeForm = serde_urlencoded::from_str(body.trim()).map_err(|e| {
            AppError::with_source(ErrorKind::Serialization, "Invalid form encoding", e)
        })?;

        match (form.oauth_token, form.oauth_token_secret) {
            (Some(oauth_token), Some(oauth_token_secret)) => Ok(Self {
                oauth_token,
                oauth_token_secret,
                mfa_token: form.mfa_token.filter(|t| !t.is_empty()),
                mfa_expiration_timestamp: form.mfa_expiration_timestamp,
            }),
            _ => Err(AppError::authentication(
                "Preauthorize response did not contain an OAuth1 token",
            )),
        }
    }
}

impl std::fmt::Debug for OAuth1Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth1Token")
            .field("oauth_token", &"****")
            .field("oauth_token_secret", &"****")
            .field("mfa_token", &self.mfa_token.as_ref().map(|_| "****"))
            .field("mfa_expiration_timestamp", &self.mfa_expiration_timestamp)
            .finish()
    }
}

/// Short-lived bearer token used for the data API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Token {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub jti: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: i64,
    /// Unix time at which the access token expires. `0` means unknown.
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub refresh_token_expires_in: i64,
    #[serde(default)]
    pub refresh_token_expires_at: i64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuth2Token {
    /// Wrap a user-supplied access token. Its lifetime is unknown.
    pub fn from_static(access_token: impl Into<String>) -> Self {
        Self {
            scope: String::new(),
            jti: String::new(),
            token_type: default_token_type(),
            access_token: access_token.into(),
            refresh_token: String::new(),
            expires_in: 0,
            expires_at: 0,
            refresh_token_expires_in: 0,
            refresh_token_expires_at: 0,
        }
    }

    /// Fill the absolute expiry times from the relative ones.
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        let now = now.timestamp();
        if self.expires_in > 0 {
            self.expires_at = now + self.expires_in;
        }
        if self.refresh_token_expires_in > 0 {
            self.refresh_token_expires_at = now + self.refresh_token_expires_in;
        }
    }

    /// Whether the access token has expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > 0 && now.timestamp() >= self.expires_at
    }
}

impl std::fmt::Debug for OAuth2Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Token")
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("access_token", &"****")
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Everything needed to resume a session after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBundle {
    /// Absent when the session was built from a static token.
    #[serde(default)]
    pub oauth1: Option<OAuth1Token>,
    pub oauth2: OAuth2Token,
    pub created_at: DateTime<Utc>,
}

impl SessionBundle {
    pub fn new(oauth1: Option<OAuth1Token>, oauth2: OAuth2Token) -> Self {
        Self {
            oauth1,
            oauth2,
            created_at: Utc::now(),
        }
    }

    /// Whether the access token can be renewed without credentials.
    pub fn can_refresh(&self) -> bool {
        self.oauth1.is_some()
    }
}

/// Fields of the preauthorize response. Unknown keys are ignored.
#[derive(Deserialize)]
struct PreauthorizeForm {
    oauth_token: Option<String>,
    oauth_token_secret: Option<String>,
    mfa_token: Option<String>,
    mfa_expiration_timestamp: Option<String>,
}
