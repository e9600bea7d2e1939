//! Authenticated client for the Connect data API.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::trace;

use garmin_auth::SessionManager;
use garmin_auth::http;
use garmin_core::config::api::ApiConfig;
use garmin_core::error::AppError;
use garmin_core::result::AppResult;

/// GETs JSON from the Connect API with the session's bearer token.
#[derive(Debug)]
pub struct ConnectClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionManager>,
}

impl ConnectClient {
    /// Create a client for the configured API host.
    pub fn new(api: &ApiConfig, session: Arc<SessionManager>) -> AppResult<Self> {
        Ok(Self {
            http: http::api_client(api)?,
            base_url: api.api_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    /// Absolute URL of an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// The session this client authenticates with.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// GET `path` and parse the body.
    ///
    /// An empty body yields `None`. A 401 yields an `Unauthorized` error.
    pub async fn get_json(&self, path: &str) -> AppResult<Option<Value>> {
        let token = self.session.access_token().await?;
        let url = self.url(path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("NK", "NT")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::unauthorized(format!("{url} rejected the access token")));
        }
        if !status.is_success() {
            return Err(AppError::external(format!("GET {url} failed with HTTP {status}")));
        }

        let body = response.text().await?;
        trace!(url = %url, bytes = body.len(), "Fetched");
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }
}
