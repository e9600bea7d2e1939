//! Integration tests for the login, MFA and refresh flows.

mod helpers;

use chrono::Utc;
use serde_json::json;

use garmin_auth::session::SessionStore;
use garmin_auth::{
    AuthPhase, LoginOutcome, OAuth1Token, OAuth2Token, PersistentCookieJar, SessionBundle,
    SessionManager,
};
use garmin_core::error::ErrorKind;
use garmin_state::keys;
use helpers::MockGarmin;

/// Persist a session whose access token has expired.
async fn seed_stale_session(tree: &std::sync::Arc<dyn garmin_core::traits::state::StateTree>) {
    let oauth1 = OAuth1Token {
        oauth_token: "stale".to_string(),
        oauth_token_secret: "stale-secret".to_string(),
        mfa_token: None,
        mfa_expiration_timestamp: None,
    };
    let mut oauth2 = OAuth2Token::from_static("expired-token");
    oauth2.expires_in = 3600;
    oauth2.expires_at = Utc::now().timestamp() - 60;

    let store = SessionStore::new(tree.clone());
    store.ensure_objects().await.unwrap();
    let cookies = PersistentCookieJar::new().to_json().unwrap();
    store
        .save(&SessionBundle::new(Some(oauth1), oauth2), &cookies)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_login_persists_session() {
    let mut garmin = MockGarmin::start().await;
    garmin
        .mock_login(helpers::SUCCESS_PAGE_WITH_GLOBALS, "access-1")
        .await;
    let config = garmin.config();

    let tree = MockGarmin::open_tree(&config).await;
    let session = SessionManager::new(&config, tree.clone()).unwrap();

    assert_eq!(session.login().await.unwrap(), LoginOutcome::LoggedIn);
    assert_eq!(session.phase().await, AuthPhase::LoggedIn);
    assert_eq!(session.access_token().await.unwrap(), "access-1");

    let viewer = session.viewer_globals().await.unwrap();
    assert_eq!(viewer.display_name(), Some("trail_runner"));

    let connected = tree.get_state(keys::INFO_CONNECTION).await.unwrap().unwrap();
    assert_eq!(connected.val, json!(true));

    // A fresh process restores the session from disk.
    let reopened = MockGarmin::open_tree(&config).await;
    let restored = SessionManager::new(&config, reopened).unwrap();
    assert!(restored.restore().await.unwrap());
    assert_eq!(restored.phase().await, AuthPhase::LoggedIn);

    let bundle = restored.bundle().await.unwrap();
    assert_eq!(bundle.oauth2.access_token, "access-1");
    assert_eq!(bundle.oauth1.unwrap().oauth_token, "t1");
}

#[tokio::test]
async fn test_mfa_challenge_waits_for_code() {
    let mut garmin = MockGarmin::start().await;
    garmin.mock_signin_form().await;
    let _credentials = garmin.mock_credentials(helpers::MFA_PAGE).await;
    let mfa = garmin.mock_mfa("123456").await;
    let _preauthorize = garmin.mock_preauthorize().await;
    let _exchange = garmin.mock_exchange("t1", "access-mfa").await;
    let config = garmin.config();

    let tree = MockGarmin::open_tree(&config).await;
    let session = SessionManager::new(&config, tree).unwrap();

    assert_eq!(session.login().await.unwrap(), LoginOutcome::MfaRequired);
    assert_eq!(session.phase().await, AuthPhase::AwaitingMfa);

    session.submit_mfa(" 123456 ").await.unwrap();
    assert_eq!(session.phase().await, AuthPhase::LoggedIn);
    assert_eq!(session.access_token().await.unwrap(), "access-mfa");
    mfa.assert_async().await;
}

#[tokio::test]
async fn test_configured_mfa_code_is_used_once() {
    let mut garmin = MockGarmin::start().await;
    garmin.mock_signin_form().await;
    let _credentials = garmin.mock_credentials(helpers::MFA_PAGE).await;
    let mfa = garmin.mock_mfa("654321").await;
    let _preauthorize = garmin.mock_preauthorize().await;
    let _exchange = garmin.mock_exchange("t1", "access-mfa").await;

    let mut config = garmin.config();
    config.account.mfa_code = Some("654321".to_string());

    let tree = MockGarmin::open_tree(&config).await;
    let session = SessionManager::new(&config, tree).unwrap();

    assert_eq!(session.login().await.unwrap(), LoginOutcome::LoggedIn);
    mfa.assert_async().await;

    // The code was consumed, so the next challenge waits for a new one.
    assert_eq!(session.login().await.unwrap(), LoginOutcome::MfaRequired);
}

#[tokio::test]
async fn test_submit_mfa_without_challenge_fails() {
    let garmin = MockGarmin::start().await;
    let config = garmin.config();

    let tree = MockGarmin::open_tree(&config).await;
    let session = SessionManager::new(&config, tree).unwrap();

    let err = session.submit_mfa("123456").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::MfaRequired);
}

#[tokio::test]
async fn test_refresh_exchanges_oauth1_token() {
    let mut garmin = MockGarmin::start().await;
    garmin.mock_signin_form().await;
    let credentials = garmin.mock_credentials(helpers::SUCCESS_PAGE).await;
    let _preauthorize = garmin.mock_preauthorize().await;
    let exchange = garmin
        .server
        .mock("POST", helpers::EXCHANGE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"access-1","token_type":"Bearer","expires_in":3600}"#)
        .expect(2)
        .create_async()
        .await;
    let config = garmin.config();

    let tree = MockGarmin::open_tree(&config).await;
    let session = SessionManager::new(&config, tree).unwrap();
    session.login().await.unwrap();
    session.refresh().await.unwrap();

    assert_eq!(session.phase().await, AuthPhase::LoggedIn);
    assert_eq!(session.refresh_interval().await.as_secs(), 3600);
    credentials.assert_async().await;
    exchange.assert_async().await;
}

#[tokio::test]
async fn test_expired_token_refreshes_before_use() {
    let mut garmin = MockGarmin::start().await;
    let _stale = garmin.mock_exchange("stale", "access-refreshed").await;
    let config = garmin.config();

    let tree = MockGarmin::open_tree(&config).await;
    seed_stale_session(&tree).await;

    let session = SessionManager::new(&config, tree).unwrap();
    assert!(session.restore().await.unwrap());
    assert_eq!(session.access_token().await.unwrap(), "access-refreshed");
}

#[tokio::test]
async fn test_rejected_refresh_falls_back_to_login() {
    let mut garmin = MockGarmin::start().await;
    let rejected = garmin.mock_exchange_rejected("stale").await;
    garmin.mock_login(helpers::SUCCESS_PAGE, "access-fresh").await;
    let config = garmin.config();

    let tree = MockGarmin::open_tree(&config).await;
    seed_stale_session(&tree).await;

    let session = SessionManager::new(&config, tree.clone()).unwrap();
    assert!(session.restore().await.unwrap());
    session.refresh().await.unwrap();

    let bundle = session.bundle().await.unwrap();
    assert_eq!(bundle.oauth2.access_token, "access-fresh");
    assert_eq!(bundle.oauth1.unwrap().oauth_token, "t1");
    rejected.assert_async().await;

    let persisted = SessionStore::new(tree).load_bundle().await.unwrap().unwrap();
    assert_eq!(persisted.oauth2.access_token, "access-fresh");
}

#[tokio::test]
async fn test_failed_login_clears_session() {
    let mut garmin = MockGarmin::start().await;
    garmin.mock_signin_form().await;
    // Wrong password: the form comes back without a ticket.
    let _credentials = garmin.mock_credentials(helpers::FORM_PAGE).await;
    let config = garmin.config();

    let tree = MockGarmin::open_tree(&config).await;
    seed_stale_session(&tree).await;

    let session = SessionManager::new(&config, tree.clone()).unwrap();
    assert!(session.restore().await.unwrap());

    let err = session.login().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);
    assert!(err.message.contains("Failed ticket"));
    assert_eq!(session.phase().await, AuthPhase::LoggedOut);
    assert!(session.bundle().await.is_none());

    let store = SessionStore::new(tree.clone());
    assert!(store.load_bundle().await.unwrap().is_none());
    let connected = tree.get_state(keys::INFO_CONNECTION).await.unwrap().unwrap();
    assert_eq!(connected.val, json!(false));
}

#[tokio::test]
async fn test_blocked_client_is_forbidden() {
    let mut garmin = MockGarmin::start().await;
    let _embed = garmin
        .server
        .mock("GET", "/sso/embed")
        .match_query(mockito::Matcher::Any)
        .with_status(403)
        .create_async()
        .await;
    let config = garmin.config();

    let tree = MockGarmin::open_tree(&config).await;
    let session = SessionManager::new(&config, tree).unwrap();

    let err = session.login().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_static_token_skips_login() {
    let mut garmin = MockGarmin::start().await;
    let embed = garmin
        .server
        .mock("GET", "/sso/embed")
        .match_query(mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let config = garmin.static_token_config();

    let tree = MockGarmin::open_tree(&config).await;
    let session = SessionManager::new(&config, tree).unwrap();

    assert_eq!(session.login().await.unwrap(), LoginOutcome::LoggedIn);
    session.refresh().await.unwrap();
    assert_eq!(session.access_token().await.unwrap(), "static-token");
    embed.assert_async().await;
}
