//! SSO sign-in flow.
//!
//! Drives the embedded sign-in widget the way the mobile app does: load the
//! widget to pick up cookies, load the sign-in form for a CSRF token, post
//! the credentials, and answer an MFA challenge when one comes back.

pub mod scrape;

use reqwest::StatusCode;
use reqwest::header::REFERER;
use tracing::{debug, error, info, warn};

use garmin_core::config::api::ApiConfig;
use garmin_core::error::AppError;
use garmin_core::result::AppResult;

use self::scrape::ViewerGlobals;

const EMBED_PATH: &str = "/sso/embed";
const SIGNIN_PATH: &str = "/sso/signin";
const MFA_PATH: &str = "/sso/verifyMFA/loginEnterMfaCode";

/// Where a sign-in step ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SsoOutcome {
    /// Signed in; the ticket can be traded for tokens.
    Ticket {
        ticket: String,
        viewer: Option<ViewerGlobals>,
    },
    /// The account needs a multi-factor code.
    MfaRequired {
        /// CSRF token of the MFA form.
        csrf: String,
    },
}

/// Client for the SSO sign-in pages.
#[derive(Debug, Clone)]
pub struct SsoClient {
    http: reqwest::Client,
    api: ApiConfig,
}

impl SsoClient {
    /// Create a client. `http` must carry the session cookie jar.
    pub fn new(http: reqwest::Client, api: ApiConfig) -> Self {
        Self { http, api }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api.sso_url, path)
    }

    fn embed_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", "gauth-widget".to_string()),
            ("embedWidget", "true".to_string()),
            ("gauthHost", self.url("/sso")),
        ]
    }

    fn signin_params(&self) -> Vec<(&'static str, String)> {
        let embed = self.url(EMBED_PATH);
        vec![
            ("id", "gauth-widget".to_string()),
            ("embedWidget", "true".to_string()),
            ("gauthHost", embed.clone()),
            ("service", embed.clone()),
            ("source", embed.clone()),
            ("redirectAfterAccountLoginUrl", embed.clone()),
            ("redirectAfterAccountCreationUrl", embed),
        ]
    }

    /// Load the widget and the sign-in form, returning the form's CSRF token.
    pub async fn start(&self) -> AppResult<String> {
        debug!("Loading SSO widget");
        let response = self
            .http
            .get(self.url(EMBED_PATH))
            .query(&self.embed_params())
            .send()
            .await?;
        check_status(response.status(), "SSO widget")?;

        let response = self
            .http
            .get(self.url(SIGNIN_PATH))
            .query(&self.signin_params())
            .header(REFERER, self.url(EMBED_PATH))
            .send()
            .await?;
        check_status(response.status(), "SSO sign-in form")?;

        scrape::extract_csrf(&response.text().await?)
    }

    /// Post the credentials.
    pub async fn submit_credentials(
        &self,
        username: &str,
        password: &str,
        csrf: &str,
    ) -> AppResult<SsoOutcome> {
        let form = [
            ("username", username),
            ("password", password),
            ("embed", "true"),
            ("_csrf", csrf),
        ];
        let response = self
            .http
            .post(self.url(SIGNIN_PATH))
            .query(&self.signin_params())
            .header(REFERER, self.url(SIGNIN_PATH))
            .form(&form)
            .send()
            .await?;
        check_status(response.status(), "SSO sign-in")?;

        let html = response.text().await?;
        if scrape::is_mfa_challenge(&html) {
            info!("Garmin account requires a multi-factor code");
            return Ok(SsoOutcome::MfaRequired {
                csrf: scrape::extract_csrf(&html)?,
            });
        }
        outcome_from_page(&html)
    }

    /// Answer the MFA challenge.
    pub async fn submit_mfa(&self, code: &str, csrf: &str) -> AppResult<SsoOutcome> {
        let form = [
            ("mfa-verification-code", code),
            ("embed", "true"),
            ("_csrf", csrf),
            ("fromPage", "setupEnterMfaCode"),
        ];
        let response = self
            .http
            .post(self.url(MFA_PATH))
            .query(&self.signin_params())
            .header(REFERER, self.url(SIGNIN_PATH))
            .form(&form)
            .send()
            .await?;
        check_status(response.status(), "MFA verification")?;

        let html = response.text().await?;
        if scrape::is_mfa_challenge(&html) {
            return Err(AppError::authentication("MFA code was not accepted"));
        }
        outcome_from_page(&html)
    }
}

fn outcome_from_page(html: &str) -> AppResult<SsoOutcome> {
    let title = scrape::extract_title(html).unwrap_or_default();
    match scrape::extract_ticket(html) {
        Ok(ticket) => {
            if title != "Success" {
                warn!(title = %title, "Ticket found on unexpected page");
            }
            Ok(SsoOutcome::Ticket {
                ticket,
                viewer: scrape::extract_viewer_globals(html),
            })
        }
        Err(_) => Err(AppError::authentication(format!(
            "Failed ticket please check username and password (page title: '{title}')"
        ))),
    }
}

fn check_status(status: StatusCode, step: &str) -> AppResult<()> {
    if status == StatusCode::FORBIDDEN {
        error!(step, "SSO answered 403: too many logins or the client was blocked");
        return Err(AppError::forbidden(format!("{step} was rejected with HTTP 403")));
    }
    if !status.is_success() {
        return Err(AppError::authentication(format!("{step} failed with HTTP {status}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const FORM_PAGE: &str =
        r#"<html><head><title>GARMIN Authentication Application</title></head>
<body><input type="hidden" name="_csrf" value="CSRF-1" /></body></html>"#;

    const SUCCESS_PAGE: &str = r#"<html><head><title>Success</title></head><body>
<script>var response_url = "https:\/\/sso.garmin.com\/sso\/embed?ticket=ST-1-abc-cas";</script>
</body></html>"#;

    const MFA_PAGE: &str = r#"<html><head><title>Enter MFA code for login</title></head>
<body><form id="submit-mfa-verification-code-form">
<input type="hidden" name="_csrf" value="CSRF-MFA" /></form></body></html>"#;

    fn client_for(server: &mockito::ServerGuard) -> SsoClient {
        let api = ApiConfig {
            sso_url: server.url(),
            ..ApiConfig::default()
        };
        SsoClient::new(reqwest::Client::new(), api)
    }

    async fn mock_form(server: &mut mockito::ServerGuard) -> (mockito::Mock, mockito::Mock) {
        let embed = server
            .mock("GET", "/sso/embed")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html></html>")
            .create_async()
            .await;
        let signin = server
            .mock("GET", "/sso/signin")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(FORM_PAGE)
            .create_async()
            .await;
        (embed, signin)
    }

    #[tokio::test]
    async fn test_start_returns_csrf() {
        let mut server = mockito::Server::new_async().await;
        let _form = mock_form(&mut server).await;

        let csrf = client_for(&server).start().await.unwrap();
        assert_eq!(csrf, "CSRF-1");
    }

    #[tokio::test]
    async fn test_credentials_yield_ticket() {
        let mut server = mockito::Server::new_async().await;
        let signin = server
            .mock("POST", "/sso/signin")
            .match_query(Matcher::Any)
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("username".into(), "runner@example.com".into()),
                Matcher::UrlEncoded("_csrf".into(), "CSRF-1".into()),
                Matcher::UrlEncoded("embed".into(), "true".into()),
            ]))
            .with_status(200)
            .with_body(SUCCESS_PAGE)
            .create_async()
            .await;

        let outcome = client_for(&server)
            .submit_credentials("runner@example.com", "hunter2", "CSRF-1")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SsoOutcome::Ticket {
                ticket: "ST-1-abc-cas".to_string(),
                viewer: None
            }
        );
        signin.assert_async().await;
    }

    #[tokio::test]
    async fn test_credentials_hit_mfa() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sso/signin")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(MFA_PAGE)
            .create_async()
            .await;

        let outcome = client_for(&server)
            .submit_credentials("runner@example.com", "hunter2", "CSRF-1")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SsoOutcome::MfaRequired {
                csrf: "CSRF-MFA".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_mfa_code_yields_ticket() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sso/verifyMFA/loginEnterMfaCode")
            .match_query(Matcher::Any)
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("mfa-verification-code".into(), "123456".into()),
                Matcher::UrlEncoded("fromPage".into(), "setupEnterMfaCode".into()),
            ]))
            .with_status(200)
            .with_body(SUCCESS_PAGE)
            .create_async()
            .await;

        let outcome = client_for(&server).submit_mfa("123456", "CSRF-MFA").await.unwrap();
        assert!(matches!(outcome, SsoOutcome::Ticket { .. }));
    }

    #[tokio::test]
    async fn test_wrong_password_is_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sso/signin")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(FORM_PAGE)
            .create_async()
            .await;

        let err = client_for(&server)
            .submit_credentials("runner@example.com", "wrong", "CSRF-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind, garmin_core::error::ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn test_forbidden_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/sso/embed")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let err = client_for(&server).start().await.unwrap_err();
        assert_eq!(err.kind, garmin_core::error::ErrorKind::Forbidden);
    }
}
