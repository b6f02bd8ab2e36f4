#![allow(clippy::unwrap_used)]
// Integration tests for `Coordinator` against a wiremock Zinguo cloud.

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::TryRecvError;
use url::Url;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zinguo_core::{
    ChangeSet, ControlKey, Coordinator, CoordinatorConfig, CoreError, FanPreset, RefreshPhase,
    Switch, TlsVerification, UpdateKind,
};

const MAC: &str = "AABBCCDDEEFF";
const ACCOUNT: &str = "13800000000";

// ── Helpers ─────────────────────────────────────────────────────────

fn config(server: &MockServer) -> CoordinatorConfig {
    let mut config = CoordinatorConfig::new(ACCOUNT, SecretString::from("password"), MAC);
    config.endpoints = vec![Url::parse(&format!("{}/api/v1", server.uri())).unwrap()];
    config.tls = TlsVerification::SystemDefaults;
    config.timeout = Duration::from_secs(5);
    config.poll_interval = Duration::ZERO;
    config.settle_delay = Duration::ZERO;
    config
}

async fn setup() -> (MockServer, Coordinator) {
    let server = MockServer::start().await;
    let coordinator = Coordinator::new(config(&server)).unwrap();
    (server, coordinator)
}

fn device(light: u8, warming1: u8, wind: u8) -> Value {
    json!({
        "_id": "d1",
        "mac": MAC,
        "name": "Bathroom",
        "online": 1,
        "temperature": 24.5,
        "lightSwitch": light,
        "warmingSwitch1": warming1,
        "warmingSwitch2": 2,
        "windSwitch": wind,
        "ventilationSwitch": 2,
        "ventilationAutoClose": 10,
        "warmingAutoClose": 20,
        "overHeatAutoClose": 40,
        "comovement": 3,
        "motoVersion": 2,
        "softwareVersion": "2.1.0",
        "model": "B2"
    })
}

async fn mount_login(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/customer/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-1" })))
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_device(server: &MockServer, record: Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/device/getDeviceByMac"))
        .and(query_param("mac", MAC))
        .and(header("x-access-token", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(record))
        .mount(server)
        .await;
}

async fn mount_control_ok(server: &MockServer, times: u64) {
    Mock::given(method("PUT"))
        .and(path("/api/v1/wifiyuba/yuBaControl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": 1 })))
        .expect(times)
        .mount(server)
        .await;
}

async fn put_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.to_string() == "PUT")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

// ── Refresh ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_normalizes_device() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;
    mount_device(&server, device(1, 2, 2)).await;

    assert!(!coordinator.last_update_success());
    assert!(coordinator.state().is_none());

    let state = coordinator.refresh().await.unwrap();

    assert!(state.light_switch);
    assert!(!state.warming_switch1);
    assert!(state.online);
    assert_eq!(state.temperature, Some(24.5));
    assert_eq!(state.device_model, "浴霸开关B2");
    assert!(coordinator.last_update_success());
    assert_eq!(*coordinator.phase().borrow(), RefreshPhase::Idle);
    assert_eq!(coordinator.state().as_deref(), Some(&*state));
}

#[tokio::test]
async fn test_refresh_token_rejection_clears_token_and_fails() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/device/getDeviceByMac"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_device(&server, device(2, 2, 2)).await;

    let result = coordinator.refresh().await;
    assert!(
        matches!(result, Err(CoreError::AuthenticationFailed { .. })),
        "expected AuthenticationFailed, got: {result:?}"
    );
    assert!(!coordinator.last_update_success());
    assert_eq!(*coordinator.phase().borrow(), RefreshPhase::Idle);

    // The next cycle starts from a fresh login.
    coordinator.refresh().await.unwrap();
    assert!(coordinator.last_update_success());
}

#[tokio::test]
async fn test_refresh_accepts_record_containing_marker_text() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;
    let mut record = device(1, 2, 2);
    record["name"] = json!("Invalid_Token test bath");
    mount_device(&server, record).await;

    let state = coordinator.refresh().await.unwrap();
    assert_eq!(state.name.as_deref(), Some("Invalid_Token test bath"));
    assert!(coordinator.last_update_success());

    coordinator.refresh().await.unwrap();
    assert!(coordinator.last_update_success());
}

#[tokio::test]
async fn test_configured_name_wins_over_cloud_name() {
    let server = MockServer::start().await;
    mount_login(&server, 2).await;
    mount_device(&server, device(1, 2, 2)).await;

    let plain = Coordinator::new(config(&server)).unwrap();
    assert_eq!(plain.name(), None);
    plain.refresh().await.unwrap();
    assert_eq!(plain.name().as_deref(), Some("Bathroom"));

    let mut cfg = config(&server);
    cfg.name = Some("Upstairs".into());
    let named = Coordinator::new(cfg).unwrap();
    named.refresh().await.unwrap();
    assert_eq!(named.name().as_deref(), Some("Upstairs"));
}

#[tokio::test]
async fn test_refresh_bad_credentials_surface_distinctly() {
    let (server, coordinator) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/customer/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = coordinator.refresh().await.unwrap_err();
    assert!(err.is_invalid_credentials(), "got: {err:?}");
    assert!(!coordinator.last_update_success());
}

#[tokio::test]
async fn test_refresh_malformed_record_keeps_body() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/device/getDeviceByMac"))
        .respond_with(ResponseTemplate::new(200).set_body_string("gateway timeout"))
        .mount(&server)
        .await;

    match coordinator.refresh().await {
        Err(CoreError::MalformedResponse { body, .. }) => assert_eq!(body, "gateway timeout"),
        other => panic!("expected MalformedResponse, got: {other:?}"),
    }
}

// ── Control payloads ────────────────────────────────────────────────

#[tokio::test]
async fn test_switch_write_sends_full_switch_state() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;
    mount_device(&server, device(2, 2, 2)).await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/wifiyuba/yuBaControl"))
        .and(header("x-access-token", "tok-1"))
        .and(body_json(json!({
            "mac": MAC,
            "masterUser": ACCOUNT,
            "setParamter": false,
            "action": false,
            "lightSwitch": 1,
            "warmingSwitch1": 2,
            "warmingSwitch2": 2,
            "windSwitch": 2,
            "ventilationSwitch": 2,
            "turnOffAll": 0,
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    coordinator.refresh().await.unwrap();
    assert!(
        coordinator
            .send_control_command(&ChangeSet::switch(Switch::LightSwitch, true))
            .await
    );
}

#[tokio::test]
async fn test_heater_write_forces_wind_on() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;
    mount_device(&server, device(2, 2, 2)).await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/wifiyuba/yuBaControl"))
        .and(body_partial_json(json!({
            "warmingSwitch1": 1,
            "windSwitch": 1,
            "lightSwitch": 2,
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    coordinator.refresh().await.unwrap();
    assert!(
        coordinator
            .send_control_command(&ChangeSet::fan_preset(FanPreset::Heat1))
            .await
    );
}

#[tokio::test]
async fn test_parameter_write_omits_switches() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;
    mount_device(&server, device(1, 2, 2)).await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/wifiyuba/yuBaControl"))
        .and(body_json(json!({
            "mac": MAC,
            "masterUser": ACCOUNT,
            "setParamter": true,
            "action": false,
            "comovement": 3,
            "motoVersion": 2,
            "overHeatAutoClose": 50,
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    coordinator.refresh().await.unwrap();
    let cs = ChangeSet::new().with(ControlKey::OverHeatAutoClose, 50_i64);
    assert!(coordinator.send_control_command(&cs).await);
}

#[tokio::test]
async fn test_calibration_write_is_a_parameter_command() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;
    mount_device(&server, device(1, 2, 2)).await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/wifiyuba/yuBaControl"))
        .and(body_json(json!({
            "mac": MAC,
            "masterUser": ACCOUNT,
            "setParamter": true,
            "action": false,
            "comovement": 3,
            "motoVersion": 2,
            "temperatureCalibration": 4,
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    coordinator.refresh().await.unwrap();
    let cs = ChangeSet::new().with(ControlKey::TemperatureCalibration, 4_i64);
    assert!(coordinator.send_control_command(&cs).await);
}

#[tokio::test]
async fn test_write_without_cache_sends_all_off() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;
    mount_device(&server, device(2, 2, 2)).await;
    mount_control_ok(&server, 1).await;

    let cs = ChangeSet::switch(Switch::VentilationSwitch, true);
    assert!(coordinator.send_control_command(&cs).await);

    let bodies = put_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body["ventilationSwitch"], json!(1));
    for field in ["lightSwitch", "warmingSwitch1", "warmingSwitch2", "windSwitch"] {
        assert_eq!(body[field], json!(2), "{field}");
    }
}

#[tokio::test]
async fn test_same_write_twice_sends_same_payload() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;
    // The device ignores the write, so the cache is unchanged between sends.
    mount_device(&server, device(2, 2, 1)).await;
    mount_control_ok(&server, 2).await;

    coordinator.refresh().await.unwrap();
    let cs = ChangeSet::switch(Switch::LightSwitch, true);
    assert!(coordinator.send_control_command(&cs).await);
    assert!(coordinator.send_control_command(&cs).await);

    let bodies = put_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn test_invalid_write_sends_nothing() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 0).await;
    mount_control_ok(&server, 0).await;

    let cs = ChangeSet::new().with(ControlKey::VentilationAutoClose, 90_i64);
    let result = coordinator.try_send_control_command(&cs).await;
    assert!(
        matches!(result, Err(CoreError::ValidationFailed { .. })),
        "expected ValidationFailed, got: {result:?}"
    );
}

// ── Token-expiry retry ──────────────────────────────────────────────

#[tokio::test]
async fn test_rejected_token_relogs_once_and_resends() {
    let (server, coordinator) = setup().await;
    // Initial login plus exactly one re-login.
    mount_login(&server, 2).await;
    mount_device(&server, device(2, 2, 2)).await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/wifiyuba/yuBaControl"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_control_ok(&server, 1).await;

    coordinator.refresh().await.unwrap();
    assert!(
        coordinator
            .send_control_command(&ChangeSet::switch(Switch::LightSwitch, true))
            .await
    );
}

#[tokio::test]
async fn test_invalid_token_marker_counts_as_rejection() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 2).await;
    mount_device(&server, device(2, 2, 2)).await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/wifiyuba/yuBaControl"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "error": "invalid_token" })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_control_ok(&server, 1).await;

    coordinator.refresh().await.unwrap();
    assert!(
        coordinator
            .send_control_command(&ChangeSet::switch(Switch::WindSwitch, true))
            .await
    );
}

#[tokio::test]
async fn test_acknowledged_write_mentioning_marker_is_not_resent() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;
    mount_device(&server, device(2, 2, 2)).await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/wifiyuba/yuBaControl"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "msg": "no invalid_token here" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    coordinator.refresh().await.unwrap();
    assert!(
        coordinator
            .send_control_command(&ChangeSet::switch(Switch::LightSwitch, true))
            .await
    );
}

#[tokio::test]
async fn test_retry_budget_exhausted_reports_failure() {
    let (server, coordinator) = setup().await;
    // Initial login plus one re-login after each of the first two rejections.
    mount_login(&server, 3).await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/wifiyuba/yuBaControl"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&server)
        .await;

    let cs = ChangeSet::switch(Switch::LightSwitch, true);
    match coordinator.try_send_control_command(&cs).await {
        Err(CoreError::TokenRejected { attempts }) => assert_eq!(attempts, 3),
        other => panic!("expected TokenRejected, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_retry_budget_exhausted_returns_false() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 3).await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/wifiyuba/yuBaControl"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&server)
        .await;

    assert!(
        !coordinator
            .send_control_command(&ChangeSet::turn_off_all())
            .await
    );
}

#[tokio::test]
async fn test_other_errors_are_not_retried() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/wifiyuba/yuBaControl"))
        .respond_with(ResponseTemplate::new(500).set_body_string("device offline"))
        .expect(1)
        .mount(&server)
        .await;

    let cs = ChangeSet::switch(Switch::LightSwitch, true);
    let result = coordinator.try_send_control_command(&cs).await;
    assert!(
        matches!(result, Err(CoreError::Api { status: Some(500), .. })),
        "expected Api error, got: {result:?}"
    );
}

// ── Optimistic update and confirmation ──────────────────────────────

#[tokio::test]
async fn test_optimistic_then_confirmed_when_device_disagrees() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;
    // The device never turns the light on.
    mount_device(&server, device(2, 2, 2)).await;
    mount_control_ok(&server, 1).await;

    coordinator.refresh().await.unwrap();
    let mut updates = coordinator.updates();

    assert!(
        coordinator
            .send_control_command(&ChangeSet::switch(Switch::LightSwitch, true))
            .await
    );

    let optimistic = updates.recv().await.unwrap();
    assert_eq!(optimistic.kind, UpdateKind::Optimistic);
    assert!(optimistic.state.light_switch);

    let confirmed = updates.recv().await.unwrap();
    assert_eq!(confirmed.kind, UpdateKind::Confirmed);
    assert!(!confirmed.state.light_switch);

    assert!(!coordinator.state().unwrap().light_switch);
}

#[tokio::test]
async fn test_confirmation_is_silent_when_guess_was_right() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/device/getDeviceByMac"))
        .respond_with(ResponseTemplate::new(200).set_body_json(device(2, 2, 2)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_device(&server, device(1, 2, 2)).await;
    mount_control_ok(&server, 1).await;

    coordinator.refresh().await.unwrap();
    let mut updates = coordinator.updates();

    assert!(
        coordinator
            .send_control_command(&ChangeSet::switch(Switch::LightSwitch, true))
            .await
    );

    let optimistic = updates.recv().await.unwrap();
    assert_eq!(optimistic.kind, UpdateKind::Optimistic);
    assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));
    assert!(coordinator.state().unwrap().light_switch);
}

#[tokio::test]
async fn test_optimistic_state_is_visible_during_settle_delay() {
    let server = MockServer::start().await;
    let mut cfg = config(&server);
    cfg.settle_delay = Duration::from_secs(1);
    let coordinator = Coordinator::new(cfg).unwrap();

    mount_login(&server, 1).await;
    mount_device(&server, device(2, 2, 2)).await;
    mount_control_ok(&server, 1).await;

    coordinator.refresh().await.unwrap();
    let mut updates = coordinator.updates();

    let sender = coordinator.clone();
    let handle = tokio::spawn(async move {
        sender
            .send_control_command(&ChangeSet::switch(Switch::VentilationSwitch, true))
            .await
    });

    let optimistic = updates.recv().await.unwrap();
    assert_eq!(optimistic.kind, UpdateKind::Optimistic);
    assert!(coordinator.state().unwrap().ventilation_switch);

    assert!(handle.await.unwrap());
    let confirmed = updates.recv().await.unwrap();
    assert_eq!(confirmed.kind, UpdateKind::Confirmed);
    assert!(!coordinator.state().unwrap().ventilation_switch);
}

#[tokio::test]
async fn test_failed_confirmation_still_reports_success() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/device/getDeviceByMac"))
        .respond_with(ResponseTemplate::new(200).set_body_json(device(2, 2, 2)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/device/getDeviceByMac"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_control_ok(&server, 1).await;

    coordinator.refresh().await.unwrap();
    assert!(
        coordinator
            .send_control_command(&ChangeSet::switch(Switch::LightSwitch, true))
            .await
    );
    assert!(!coordinator.last_update_success());
    assert!(coordinator.state().unwrap().light_switch);
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_periodic_refresh_publishes_updates() {
    let server = MockServer::start().await;
    let mut cfg = config(&server);
    cfg.poll_interval = Duration::from_millis(50);
    let coordinator = Coordinator::new(cfg).unwrap();

    mount_login(&server, 1).await;
    mount_device(&server, device(1, 2, 2)).await;

    let mut updates = coordinator.updates();
    coordinator.start().await.unwrap();

    // Initial refresh, then at least one scheduled one.
    for _ in 0..2 {
        let update = tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.kind, UpdateKind::Polled);
    }

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_operations_fail_after_shutdown() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;
    mount_device(&server, device(1, 2, 2)).await;

    coordinator.start().await.unwrap();
    coordinator.shutdown().await;

    assert!(matches!(
        coordinator.refresh().await,
        Err(CoreError::ShutDown)
    ));
    assert!(
        !coordinator
            .send_control_command(&ChangeSet::switch(Switch::LightSwitch, false))
            .await
    );
    // The last good state stays readable.
    assert!(coordinator.state().unwrap().light_switch);
}

#[tokio::test]
async fn test_list_devices() {
    let (server, coordinator) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/customer/devices"))
        .and(header("x-access-token", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "d1", "mac": MAC, "name": "Bathroom", "online": 1 },
            { "_id": "d2", "mac": "112233445566", "name": "Guest", "online": 2 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let devices = coordinator.list_devices().await.unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].mac, MAC);
    assert!(devices[0].is_online());
    assert!(!devices[1].is_online());
}

#[tokio::test]
async fn test_refresh_without_mac_is_config_error() {
    let server = MockServer::start().await;
    let mut cfg = config(&server);
    cfg.mac = String::new();
    let coordinator = Coordinator::new(cfg).unwrap();

    assert!(matches!(
        coordinator.refresh().await,
        Err(CoreError::Config { .. })
    ));
}
