//! Shared test helpers for integration tests.
//!
//! `MockGarmin` stands in for both the SSO host and the Connect API so the
//! full login, refresh and poll flows run against one local server.

#![allow(dead_code)]

use std::sync::Arc;

use mockito::{Matcher, Mock, ServerGuard};
use serde_json::Value;

use garmin_core::config::AppConfig;
use garmin_core::traits::state::StateTree;
use garmin_state::FileStateTree;

/// Sign-in form carrying a CSRF token.
pub const FORM_PAGE: &str = r#"<html><head><title>GARMIN Authentication Application</title></head>
<body><form method="post"><input type="hidden" name="_csrf" value="CSRF-FORM" /></form></body></html>"#;

/// MFA challenge page.
pub const MFA_PAGE: &str = r#"<html><head><title>Enter MFA code for login</title></head>
<body><form id="submit-mfa-verification-code-form">
<input type="hidden" name="_csrf" value="CSRF-MFA" /></form></body></html>"#;

/// Successful sign-in without viewer globals.
pub const SUCCESS_PAGE: &str = r#"<html><head><title>Success</title></head><body>
<script>var response_url = "https:\/\/sso.garmin.com\/sso\/embed?ticket=ST-0042-abc-cas";</script>
</body></html>"#;

/// Successful sign-in that also embeds the user's preferences.
pub const SUCCESS_PAGE_WITH_GLOBALS: &str = "<html><head><title>Success</title></head><body>
<script>var response_url = \"https:\\/\\/sso.garmin.com\\/sso\\/embed?ticket=ST-0042-abc-cas\";</script>
<script>
window.VIEWER_USERPREFERENCES = {\"displayName\":\"trail_runner\",\"measurementSystem\":\"metric\"};
window.VIEWER_SOCIAL_PROFILE = {\"displayName\":\"trail_runner\",\"fullName\":\"Trail Runner\"};
</script></body></html>";

pub const PREAUTHORIZE_PATH: &str = "/oauth-service/oauth/preauthorized";
pub const EXCHANGE_PATH: &str = "/oauth-service/oauth/exchange/user/2.0";

/// Local stand-in for the Garmin services.
pub struct MockGarmin {
    pub server: ServerGuard,
    /// Setup mocks kept alive for the lifetime of the test.
    mocks: Vec<Mock>,
    state_dir: tempfile::TempDir,
}

impl MockGarmin {
    /// Start a mock server.
    pub async fn start() -> Self {
        Self {
            server: mockito::Server::new_async().await,
            mocks: Vec::new(),
            state_dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    /// Credentials config pointing every URL at the mock server.
    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.account.username = "runner@example.com".to_string();
        config.account.password = "hunter2".to_string();
        config.api.sso_url = self.server.url();
        config.api.api_url = self.server.url();
        config.api.consumer_url = format!("{}/oauth_consumer.json", self.server.url());
        config.api.consumer_key = Some("consumer-key".to_string());
        config.api.consumer_secret = Some("consumer-secret".to_string());
        config.state.path = self
            .state_dir
            .path()
            .join("state.json")
            .to_string_lossy()
            .into_owned();
        config.normalize().expect("Test config is valid");
        config
    }

    /// Config that skips the SSO login with a static access token.
    pub fn static_token_config(&self) -> AppConfig {
        let mut config = self.config();
        config.account.username = String::new();
        config.account.password = String::new();
        config.account.token = Some("static-token".to_string());
        config
    }

    /// Open (or reopen) the file-backed tree named by `config`.
    pub async fn open_tree(config: &AppConfig) -> Arc<dyn StateTree> {
        Arc::new(
            FileStateTree::open(&config.state.path)
                .await
                .expect("Failed to open state tree"),
        )
    }

    /// Serve the widget and the sign-in form.
    pub async fn mock_signin_form(&mut self) {
        let embed = self
            .server
            .mock("GET", "/sso/embed")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html><body>widget</body></html>")
            .create_async()
            .await;
        let form = self
            .server
            .mock("GET", "/sso/signin")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(FORM_PAGE)
            .create_async()
            .await;
        self.mocks.extend([embed, form]);
    }

    /// Answer the credential post with `page`.
    pub async fn mock_credentials(&mut self, page: &str) -> Mock {
        self.server
            .mock("POST", "/sso/signin")
            .match_query(Matcher::Any)
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("username".into(), "runner@example.com".into()),
                Matcher::UrlEncoded("password".into(), "hunter2".into()),
                Matcher::UrlEncoded("_csrf".into(), "CSRF-FORM".into()),
            ]))
            .with_status(200)
            .with_body(page)
            .create_async()
            .await
    }

    /// Accept `code` on the MFA form.
    pub async fn mock_mfa(&mut self, code: &str) -> Mock {
        self.server
            .mock("POST", "/sso/verifyMFA/loginEnterMfaCode")
            .match_query(Matcher::Any)
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("mfa-verification-code".into(), code.into()),
                Matcher::UrlEncoded("_csrf".into(), "CSRF-MFA".into()),
            ]))
            .with_status(200)
            .with_body(SUCCESS_PAGE)
            .create_async()
            .await
    }

    /// Trade the ticket for OAuth1 token `t1`.
    pub async fn mock_preauthorize(&mut self) -> Mock {
        self.server
            .mock("GET", PREAUTHORIZE_PATH)
            .match_query(Matcher::UrlEncoded("ticket".into(), "ST-0042-abc-cas".into()))
            .match_header("authorization", Matcher::Regex("^OAuth ".into()))
            .with_status(200)
            .with_body("oauth_token=t1&oauth_token_secret=s1")
            .create_async()
            .await
    }

    /// Exchange OAuth1 token `oauth_token` for `access_token`.
    pub async fn mock_exchange(&mut self, oauth_token: &str, access_token: &str) -> Mock {
        let body = serde_json::json!({
            "scope": "CONNECT_READ CONNECT_WRITE",
            "jti": "jti-1",
            "token_type": "Bearer",
            "access_token": access_token,
            "refresh_token": "refresh-1",
            "expires_in": 3600,
            "refresh_token_expires_in": 7200,
        });
        self.server
            .mock("POST", EXCHANGE_PATH)
            .match_header(
                "authorization",
                Matcher::Regex(format!("oauth_token=\"{oauth_token}\"")),
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    /// Reject the exchange for OAuth1 token `oauth_token`.
    pub async fn mock_exchange_rejected(&mut self, oauth_token: &str) -> Mock {
        self.server
            .mock("POST", EXCHANGE_PATH)
            .match_header(
                "authorization",
                Matcher::Regex(format!("oauth_token=\"{oauth_token}\"")),
            )
            .with_status(401)
            .create_async()
            .await
    }

    /// Serve the whole credential login ending in access token `access_token`.
    pub async fn mock_login(&mut self, page: &str, access_token: &str) {
        self.mock_signin_form().await;
        let credentials = self.mock_credentials(page).await;
        let preauthorize = self.mock_preauthorize().await;
        let exchange = self.mock_exchange("t1", access_token).await;
        self.mocks.extend([credentials, preauthorize, exchange]);
    }

    /// Serve `body` on a data API path (any query string) with bearer `token`.
    pub async fn mock_data(&mut self, path: &str, token: &str, body: &Value) -> Mock {
        self.server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .match_header("authorization", format!("Bearer {token}").as_str())
            .match_header("nk", "NT")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    /// Serve `body` on every path matching `pattern`.
    pub async fn mock_data_regex(&mut self, pattern: &str, body: &Value) -> Mock {
        self.server
            .mock("GET", Matcher::Regex(pattern.to_string()))
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    /// Answer 401 on a data API path.
    pub async fn mock_unauthorized(&mut self, path: &str) -> Mock {
        self.server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await
    }

    /// Keep a mock alive without asserting on it.
    pub fn keep(&mut self, mock: Mock) {
        self.mocks.push(mock);
    }
}
