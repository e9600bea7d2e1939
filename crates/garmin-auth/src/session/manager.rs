//! Session lifecycle manager: login, MFA, refresh and logout.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use garmin_core::config::AppConfig;
use garmin_core::config::account::AccountConfig;
use garmin_core::error::{AppError, ErrorKind};
use garmin_core::result::AppResult;
use garmin_core::traits::state::StateTree;

use crate::cookies::PersistentCookieJar;
use crate::http;
use crate::oauth::OAuthClient;
use crate::oauth::tokens::{OAuth2Token, SessionBundle};
use crate::sso::scrape::ViewerGlobals;
use crate::sso::{SsoClient, SsoOutcome};

use super::store::SessionStore;

/// Where the session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// No usable token.
    LoggedOut,
    /// The SSO asked for a multi-factor code that has not been supplied.
    AwaitingMfa,
    /// A bearer token is available.
    LoggedIn,
}

/// Result of a login attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Tokens obtained and persisted.
    LoggedIn,
    /// Stopped at the MFA challenge; call [`SessionManager::submit_mfa`].
    MfaRequired,
}

#[derive(Debug)]
struct SessionState {
    phase: AuthPhase,
    bundle: Option<SessionBundle>,
    /// CSRF token of a pending MFA form.
    mfa_csrf: Option<String>,
    /// One-shot MFA code used by the next challenge.
    mfa_code: Option<String>,
    viewer: Option<ViewerGlobals>,
}

/// Owns the tokens and drives every authentication flow.
pub struct SessionManager {
    account: AccountConfig,
    default_lifetime: Duration,
    sso: SsoClient,
    oauth: OAuthClient,
    jar: PersistentCookieJar,
    store: SessionStore,
    state: RwLock<SessionState>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("account", &self.account)
            .field("default_lifetime", &self.default_lifetime)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Build the manager and its HTTP clients.
    pub fn new(config: &AppConfig, tree: Arc<dyn StateTree>) -> AppResult<Self> {
        let jar = PersistentCookieJar::new();
        let sso = SsoClient::new(http::sso_client(&config.api, &jar)?, config.api.clone());
        let oauth = OAuthClient::new(http::api_client(&config.api)?, config.api.clone());

        Ok(Self {
            account: config.account.clone(),
            default_lifetime: Duration::from_secs(config.polling.default_token_lifetime_seconds),
            sso,
            oauth,
            jar,
            store: SessionStore::new(tree),
            state: RwLock::new(SessionState {
                phase: AuthPhase::LoggedOut,
                bundle: None,
                mfa_csrf: None,
                mfa_code: config
                    .account
                    .mfa_code
                    .clone()
                    .filter(|c| !c.trim().is_empty()),
                viewer: None,
            }),
        })
    }

    /// Current phase.
    pub async fn phase(&self) -> AuthPhase {
        self.state.read().await.phase
    }

    /// Copy of the current token bundle.
    pub async fn bundle(&self) -> Option<SessionBundle> {
        self.state.read().await.bundle.clone()
    }

    /// Viewer globals scraped during the last login, if the page had any.
    pub async fn viewer_globals(&self) -> Option<ViewerGlobals> {
        self.state.read().await.viewer.clone()
    }

    /// Supply the MFA code for the next challenge.
    pub async fn set_mfa_code(&self, code: impl Into<String>) {
        self.state.write().await.mfa_code = Some(code.into());
    }

    /// Load the persisted session and cookie jar.
    ///
    /// Returns `true` when a token bundle was restored.
    pub async fn restore(&self) -> AppResult<bool> {
        self.store.ensure_objects().await?;

        if let Some(cookies) = self.store.load_cookies().await? {
            if let Err(e) = self.jar.load_json(&cookies) {
                warn!(error = %e, "Discarding stored cookie jar");
            }
        }

        let Some(bundle) = self.store.load_bundle().await? else {
            debug!("No stored session");
            return Ok(false);
        };

        info!(
            created_at = %bundle.created_at,
            refreshable = bundle.can_refresh(),
            "Restored stored session"
        );
        let mut state = self.state.write().await;
        state.bundle = Some(bundle);
        state.phase = AuthPhase::LoggedIn;
        Ok(true)
    }

    /// Log in with the configured credentials, or adopt the configured static token.
    ///
    /// When the service rejects the login the persisted session is cleared and
    /// the one-shot MFA code is forgotten. Transport failures keep the session.
    pub async fn login(&self) -> AppResult<LoginOutcome> {
        if self.account.has_static_token() {
            let token = self.account.token.as_deref().unwrap_or_default().trim();
            self.install(SessionBundle::new(None, OAuth2Token::from_static(token)))
                .await?;
            info!("Using configured access token, skipping login");
            return Ok(LoginOutcome::LoggedIn);
        }

        match self.sso_login().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.fail_login(&e).await;
                Err(e)
            }
        }
    }

    async fn sso_login(&self) -> AppResult<LoginOutcome> {
        info!(username = %self.account.username, "Logging in to Garmin Connect");
        let csrf = self.sso.start().await?;

        let outcome = self
            .sso
            .submit_credentials(&self.account.username, &self.account.password, &csrf)
            .await?;

        match outcome {
            SsoOutcome::Ticket { ticket, viewer } => {
                self.complete(&ticket, viewer).await?;
                Ok(LoginOutcome::LoggedIn)
            }
            SsoOutcome::MfaRequired { csrf } => {
                let code = self.state.write().await.mfa_code.take();
                if let Some(code) = code {
                    info!("Submitting configured MFA code");
                    self.finish_mfa(&code, &csrf).await?;
                    return Ok(LoginOutcome::LoggedIn);
                }

                let mut state = self.state.write().await;
                state.phase = AuthPhase::AwaitingMfa;
                state.mfa_csrf = Some(csrf);
                warn!("MFA required. Please enter MFA in the settings");
                Ok(LoginOutcome::MfaRequired)
            }
        }
    }

    /// Continue a pending MFA challenge with `code`.
    pub async fn submit_mfa(&self, code: &str) -> AppResult<()> {
        let csrf = self
            .state
            .read()
            .await
            .mfa_csrf
            .clone()
            .ok_or_else(|| AppError::mfa_required("No MFA challenge is pending, log in first"))?;

        match self.finish_mfa(code.trim(), &csrf).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fail_login(&e).await;
                Err(e)
            }
        }
    }

    async fn finish_mfa(&self, code: &str, csrf: &str) -> AppResult<()> {
        match self.sso.submit_mfa(code, csrf).await? {
            SsoOutcome::Ticket { ticket, viewer } => self.complete(&ticket, viewer).await,
            SsoOutcome::MfaRequired { .. } => {
                Err(AppError::mfa_required("MFA challenge repeated after code submission"))
            }
        }
    }

    async fn complete(&self, ticket: &str, viewer: Option<ViewerGlobals>) -> AppResult<()> {
        let oauth1 = self.oauth.preauthorize(ticket).await?;
        let oauth2 = self.oauth.exchange(&oauth1).await?;

        {
            let mut state = self.state.write().await;
            state.viewer = viewer;
            state.mfa_csrf = None;
        }
        self.install(SessionBundle::new(Some(oauth1), oauth2)).await?;
        info!("Login successful");
        Ok(())
    }

    /// Persist `bundle`, mark the connection up and make it current.
    async fn install(&self, bundle: SessionBundle) -> AppResult<()> {
        let cookies = self.jar.to_json()?;
        self.store.save(&bundle, &cookies).await?;
        self.store.set_connection(true).await?;

        let mut state = self.state.write().await;
        state.bundle = Some(bundle);
        state.phase = AuthPhase::LoggedIn;
        Ok(())
    }

    async fn fail_login(&self, err: &AppError) {
        if err.is_login_failure() || err.kind == ErrorKind::MfaRequired {
            error!(error = %err, "Login failed");
            self.reset().await;
        } else {
            warn!(error = %err, "Login attempt did not complete, keeping session");
        }
    }

    async fn reset(&self) {
        {
            let mut state = self.state.write().await;
            state.phase = AuthPhase::LoggedOut;
            state.bundle = None;
            state.mfa_csrf = None;
            state.mfa_code = None;
        }
        if let Err(e) = self.jar.clear() {
            warn!(error = %e, "Failed to clear cookie jar");
        }
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear stored session");
        }
        if let Err(e) = self.store.set_connection(false).await {
            warn!(error = %e, "Failed to update connection state");
        }
    }

    /// Mint a new access token from the OAuth1 token.
    ///
    /// Falls back to a full login when there is no OAuth1 token or the
    /// exchange is rejected.
    pub async fn refresh(&self) -> AppResult<()> {
        if self.account.has_static_token() {
            debug!("Static access token configured, nothing to refresh");
            return Ok(());
        }

        let oauth1 = self
            .state
            .read()
            .await
            .bundle
            .as_ref()
            .and_then(|b| b.oauth1.clone());
        let Some(oauth1) = oauth1 else {
            info!("No refreshable session, logging in again");
            return self.relogin().await;
        };

        match self.oauth.exchange(&oauth1).await {
            Ok(oauth2) => {
                self.install(SessionBundle::new(Some(oauth1), oauth2)).await?;
                info!("Access token refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, logging in again");
                self.relogin().await
            }
        }
    }

    async fn relogin(&self) -> AppResult<()> {
        match self.login().await? {
            LoginOutcome::LoggedIn => Ok(()),
            LoginOutcome::MfaRequired => Err(AppError::mfa_required(
                "MFA required. Please enter MFA in the settings",
            )),
        }
    }

    /// The current bearer token, refreshed first if it has expired.
    pub async fn access_token(&self) -> AppResult<String> {
        if let Some(token) = self.current_token().await? {
            return Ok(token);
        }
        info!("Access token expired, refreshing");
        self.refresh().await?;
        self.current_token()
            .await?
            .ok_or_else(|| AppError::unauthorized("Access token still expired after refresh"))
    }

    /// `Ok(None)` when the token has expired.
    async fn current_token(&self) -> AppResult<Option<String>> {
        let state = self.state.read().await;
        let bundle = state
            .bundle
            .as_ref()
            .ok_or_else(|| AppError::unauthorized("Not logged in"))?;
        if bundle.oauth2.is_expired(Utc::now()) {
            Ok(None)
        } else {
            Ok(Some(bundle.oauth2.access_token.clone()))
        }
    }

    /// How long until the token should be refreshed.
    pub async fn refresh_interval(&self) -> Duration {
        self.state
            .read()
            .await
            .bundle
            .as_ref()
            .map(|b| b.oauth2.expires_in)
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs as u64))
            .unwrap_or(self.default_lifetime)
    }

    /// Forget the session, locally and in the state tree.
    pub async fn logout(&self) {
        self.reset().await;
        info!("Logged out");
    }
}
