//! Integration tests for device discovery, polling and the adapter loop.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;

use garmin_core::types::state::ObjectKind;
use garmin_state::keys;
use garmin_sync::{Adapter, PollReport};
use helpers::MockGarmin;

const DEVICES_PATH: &str = "/device-service/deviceregistration/devices";
const SOCIAL_PROFILE_PATH: &str = "/userprofile-service/socialProfile";
const USER_SETTINGS_PATH: &str = "/userprofile-service/userprofile/user-settings";
const USER_SUMMARY_PATTERN: &str = "^/usersummary-service/usersummary/daily/trail_runner$";

/// Catalog entries that are not mocked answer 501 and count as failed.
const UNMOCKED_ENDPOINTS: usize = 8;

/// Serve the device list and the profile to bearer `token`.
async fn mock_account(garmin: &mut MockGarmin, token: &str) {
    let devices = garmin
        .mock_data(
            DEVICES_PATH,
            token,
            &json!([{
                "unitId": 3345678,
                "productDisplayName": "Forerunner 965",
                "batteryStatus": "GOOD",
                "deviceSettings": {"timeFormat": "time_twenty_four_hr"}
            }]),
        )
        .await;
    let social = garmin
        .mock_data(
            SOCIAL_PROFILE_PATH,
            token,
            &json!({"displayName": "trail_runner", "fullName": "Trail Runner"}),
        )
        .await;
    let settings = garmin
        .mock_data(
            USER_SETTINGS_PATH,
            token,
            &json!({"userData": {"measurementSystem": "metric"}}),
        )
        .await;
    garmin.keep(devices);
    garmin.keep(social);
    garmin.keep(settings);
}

#[tokio::test]
async fn test_on_ready_discovers_devices_and_polls() {
    let mut garmin = MockGarmin::start().await;
    mock_account(&mut garmin, "static-token").await;
    let summary = garmin
        .mock_data_regex(USER_SUMMARY_PATTERN, &json!({"totalSteps": 8123, "floorsAscended": 4}))
        .await;
    let config = garmin.static_token_config();

    let tree = MockGarmin::open_tree(&config).await;
    let adapter = Adapter::new(config, tree.clone()).unwrap();

    assert!(adapter.on_ready().await.unwrap());
    summary.assert_async().await;

    assert_eq!(adapter.devices().ids(), vec!["3345678".to_string()]);
    let device = tree.get_object(&keys::device("3345678")).await.unwrap().unwrap();
    assert_eq!(device.kind, ObjectKind::Device);
    assert_eq!(device.name, "Forerunner 965");

    let refresh = tree
        .get_state(&keys::device_refresh("3345678"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refresh.val, json!(false));

    let battery = tree
        .get_state("devices.3345678.general.batteryStatus")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(battery.val, json!("GOOD"));

    let steps = tree.get_state("usersummary.totalSteps").await.unwrap().unwrap();
    assert_eq!(steps.val, json!(8123));
    let name = tree
        .get_state("social_profile.fullName")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(name.val, json!("Trail Runner"));

    assert_eq!(
        adapter.last_report().await,
        PollReport {
            updated: 1,
            empty: 0,
            failed: UNMOCKED_ENDPOINTS,
            unauthorized: false,
        }
    );
}

#[tokio::test]
async fn test_unauthorized_endpoint_is_reported() {
    let mut garmin = MockGarmin::start().await;
    mock_account(&mut garmin, "static-token").await;
    let _summary = garmin
        .server
        .mock("GET", mockito::Matcher::Regex(USER_SUMMARY_PATTERN.to_string()))
        .match_query(mockito::Matcher::Any)
        .with_status(401)
        .create_async()
        .await;
    let config = garmin.static_token_config();

    let tree = MockGarmin::open_tree(&config).await;
    let adapter = Adapter::new(config, tree).unwrap();

    assert!(adapter.on_ready().await.unwrap());
    let report = adapter.last_report().await;
    assert!(report.unauthorized);
    assert_eq!(report.updated, 0);
}

#[tokio::test]
async fn test_unauthorized_poll_schedules_token_refresh() {
    let mut garmin = MockGarmin::start().await;
    mock_account(&mut garmin, "access-1").await;
    let _summary = garmin
        .server
        .mock("GET", mockito::Matcher::Regex(USER_SUMMARY_PATTERN.to_string()))
        .match_query(mockito::Matcher::Any)
        .with_status(401)
        .create_async()
        .await;
    garmin.mock_signin_form().await;
    let _credentials = garmin.mock_credentials(helpers::SUCCESS_PAGE).await;
    let _preauthorize = garmin.mock_preauthorize().await;
    // Once for the login, once for the refresh after the 401.
    let exchange = garmin
        .server
        .mock("POST", helpers::EXCHANGE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"access-1","token_type":"Bearer","expires_in":3600}"#)
        .expect(2)
        .create_async()
        .await;
    let mut config = garmin.config();
    config.polling.unauthorized_retry_seconds = 1;

    let tree = MockGarmin::open_tree(&config).await;
    let adapter = Arc::new(Adapter::new(config, tree).unwrap());
    assert!(adapter.on_ready().await.unwrap());
    assert!(adapter.last_report().await.unauthorized);
    assert!(!exchange.matched_async().await);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let runner = Arc::clone(&adapter);
    let handle = tokio::spawn(async move { runner.run(cancel_rx).await });

    let mut refreshed = false;
    for _ in 0..50 {
        if exchange.matched_async().await {
            refreshed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    cancel_tx.send(true).unwrap();
    handle.await.unwrap();
    assert!(refreshed, "401 did not schedule a token refresh");
    assert_eq!(
        adapter.session().phase().await,
        garmin_auth::AuthPhase::LoggedIn
    );
}

#[tokio::test]
async fn test_pending_mfa_skips_polling() {
    let mut garmin = MockGarmin::start().await;
    garmin.mock_signin_form().await;
    let _credentials = garmin.mock_credentials(helpers::MFA_PAGE).await;
    let devices = garmin
        .server
        .mock("GET", DEVICES_PATH)
        .expect(0)
        .create_async()
        .await;
    let config = garmin.config();

    let tree = MockGarmin::open_tree(&config).await;
    let adapter = Adapter::new(config, tree).unwrap();

    assert!(!adapter.on_ready().await.unwrap());
    assert_eq!(adapter.update().await.unwrap(), PollReport::default());
    devices.assert_async().await;
}

#[tokio::test]
async fn test_refresh_button_triggers_poll() {
    let mut garmin = MockGarmin::start().await;
    mock_account(&mut garmin, "static-token").await;
    let summary = garmin
        .server
        .mock("GET", mockito::Matcher::Regex(USER_SUMMARY_PATTERN.to_string()))
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(json!({"totalSteps": 9000}).to_string())
        .expect(2)
        .create_async()
        .await;
    let config = garmin.static_token_config();

    let tree = MockGarmin::open_tree(&config).await;
    let adapter = Arc::new(Adapter::new(config, tree.clone()).unwrap());
    assert!(adapter.on_ready().await.unwrap());

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let runner = Arc::clone(&adapter);
    let handle = tokio::spawn(async move { runner.run(cancel_rx).await });

    // Let the loop subscribe before writing the command.
    tokio::time::sleep(Duration::from_millis(200)).await;
    tree.set_state(&keys::device_refresh("3345678"), json!(true), false)
        .await
        .unwrap();

    let mut polled = false;
    for _ in 0..50 {
        if summary.matched_async().await {
            polled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    cancel_tx.send(true).unwrap();
    handle.await.unwrap();
    assert!(polled, "Refresh button did not trigger a poll");
}

#[tokio::test]
async fn test_unload_persists_tree() {
    let mut garmin = MockGarmin::start().await;
    mock_account(&mut garmin, "static-token").await;
    let _summary = garmin
        .mock_data_regex(USER_SUMMARY_PATTERN, &json!({"totalSteps": 8123}))
        .await;
    let config = garmin.static_token_config();

    let tree = MockGarmin::open_tree(&config).await;
    let adapter = Adapter::new(config.clone(), tree).unwrap();
    adapter.on_ready().await.unwrap();
    adapter.on_unload().await;

    let reopened = MockGarmin::open_tree(&config).await;
    let steps = reopened
        .get_state("usersummary.totalSteps")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(steps.val, json!(8123));
    let connected = reopened
        .get_state(keys::INFO_CONNECTION)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(connected.val, json!(false));
}
