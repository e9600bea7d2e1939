//! OAuth endpoints of the Connect API.
//!
//! A service ticket is traded for an OAuth1 token (`preauthorized`), and the
//! OAuth1 token for an OAuth2 bearer token (`exchange/user/2.0`). Both calls
//! are signed with the mobile app's consumer key pair.

pub mod signer;
pub mod tokens;

use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use garmin_core::config::api::ApiConfig;
use garmin_core::error::AppError;
use garmin_core::result::AppResult;

use self::signer::OAuth1Signer;
use self::tokens::{Consumer, OAuth1Token, OAuth2Token};

const PREAUTHORIZE_PATH: &str = "/oauth-service/oauth/preauthorized";
const EXCHANGE_PATH: &str = "/oauth-service/oauth/exchange/user/2.0";

/// Client for the OAuth token endpoints.
#[derive(Debug)]
pub struct OAuthClient {
    http: reqwest::Client,
    api: ApiConfig,
    consumer: OnceCell<Consumer>,
}

impl OAuthClient {
    /// Create a client. `http` should present the app user agent.
    pub fn new(http: reqwest::Client, api: ApiConfig) -> Self {
        Self {
            http,
            api,
            consumer: OnceCell::new(),
        }
    }

    /// The consumer key pair: the configured override, or the published one.
    ///
    /// The published pair is fetched once per process.
    pub async fn consumer(&self) -> AppResult<Consumer> {
        if let (Some(key), Some(secret)) = (&self.api.consumer_key, &self.api.consumer_secret) {
            return Ok(Consumer {
                consumer_key: key.clone(),
                consumer_secret: secret.clone(),
            });
        }

        let consumer = self
            .consumer
            .get_or_try_init(|| self.fetch_consumer())
            .await?;
        Ok(consumer.clone())
    }

    async fn fetch_consumer(&self) -> AppResult<Consumer> {
        debug!(url = %self.api.consumer_url, "Fetching OAuth consumer");
        let response = self.http.get(&self.api.consumer_url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::external(format!(
                "OAuth consumer fetch failed with HTTP {}",
                response.status()
            )));
        }
        Ok(response.json::<Consumer>().await?)
    }

    /// Trade a service ticket for an OAuth1 token.
    pub async fn preauthorize(&self, ticket: &str) -> AppResult<OAuth1Token> {
        let consumer = self.consumer().await?;
        let url = format!("{}{}", self.api.api_url, PREAUTHORIZE_PATH);
        let params = vec![
            ("ticket".to_string(), ticket.to_string()),
            ("login-url".to_string(), format!("{}/sso/embed", self.api.sso_url)),
            ("accept-DI-TOS".to_string(), "true".to_string()),
        ];
        let authorization =
            OAuth1Signer::new(&consumer).authorization_header("GET", &url, &params);

        let response = self
            .http
            .get(&url)
            .query(&params)
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::authentication(format!(
                "Ticket preauthorization failed with HTTP {status}"
            )));
        }

        let token = OAuth1Token::from_form(&response.text().await?)?;
        info!(mfa = token.mfa_token.is_some(), "Obtained OAuth1 token");
        Ok(token)
    }

    /// Trade an OAuth1 token for a fresh OAuth2 token.
    pub async fn exchange(&self, oauth1: &OAuth1Token) -> AppResult<OAuth2Token> {
        let consumer = self.consumer().await?;
        let url = format!("{}{}", self.api.api_url, EXCHANGE_PATH);
        let form: Vec<(String, String)> = oauth1
            .mfa_token
            .iter()
            .map(|t| ("mfa_token".to_string(), t.clone()))
            .collect();
        let authorization = OAuth1Signer::new(&consumer)
            .with_token(&oauth1.oauth_token, &oauth1.oauth_token_secret)
            .authorization_header("POST", &url, &form);

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::authentication(format!(
                "OAuth2 exchange failed with HTTP {status}"
            )));
        }

        let mut token: OAuth2Token = response.json().await?;
        token.stamp(Utc::now());
        debug!(expires_in = token.expires_in, "Obtained OAuth2 token");
        Ok(token)
    }
}
