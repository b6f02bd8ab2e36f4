#![allow(clippy::unwrap_used)]
// Integration tests for `SessionManager` endpoint probing and token lifecycle.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zinguo_api::{Credentials, Error, SessionManager, ZinguoClient};

// ── Helpers ─────────────────────────────────────────────────────────

fn endpoint_of(server: &MockServer) -> Url {
    Url::parse(&format!("{}/api/v1", server.uri())).unwrap()
}

fn session(candidates: Vec<Url>) -> SessionManager {
    let client = ZinguoClient::with_client(reqwest::Client::new(), Duration::from_secs(5));
    let credentials = Credentials::new("13800000000", SecretString::from("password"));
    SessionManager::new(client, credentials, candidates)
}

async fn mount_login(server: &MockServer, response: ResponseTemplate, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/customer/login"))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

// ── Endpoint fallback ───────────────────────────────────────────────

#[tokio::test]
async fn test_first_working_endpoint_is_pinned() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    // The primary is probed exactly once; re-logins never go back to it.
    mount_login(&primary, ResponseTemplate::new(503), 1).await;
    mount_login(
        &secondary,
        ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-2" })),
        2,
    )
    .await;

    let session = session(vec![endpoint_of(&primary), endpoint_of(&secondary)]);

    let (endpoint, token) = session.resolve_endpoint_and_login().await.unwrap();
    assert_eq!(endpoint, endpoint_of(&secondary));
    assert_eq!(token.expose_secret(), "tok-2");
    assert_eq!(session.endpoint().await, Some(endpoint_of(&secondary)));

    session.invalidate().await;
    assert!(!session.has_token().await);

    let auth = session.ensure_token().await.unwrap();
    assert_eq!(auth.endpoint, endpoint_of(&secondary));
}

#[tokio::test]
async fn test_first_endpoint_wins_when_both_work() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    mount_login(
        &primary,
        ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-1" })),
        1,
    )
    .await;
    mount_login(&secondary, ResponseTemplate::new(200), 0).await;

    let session = session(vec![endpoint_of(&primary), endpoint_of(&secondary)]);
    let auth = session.login().await.unwrap();

    assert_eq!(auth.endpoint, endpoint_of(&primary));
}

#[tokio::test]
async fn test_all_endpoints_failing() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    mount_login(&primary, ResponseTemplate::new(500), 1).await;
    mount_login(&secondary, ResponseTemplate::new(200).set_body_string("not json"), 1).await;

    let session = session(vec![endpoint_of(&primary), endpoint_of(&secondary)]);
    let result = session.ensure_token().await;

    assert!(
        matches!(result, Err(Error::NoWorkingEndpoint { tried: 2 })),
        "expected NoWorkingEndpoint, got: {result:?}"
    );
    assert_eq!(session.endpoint().await, None);
}

#[tokio::test]
async fn test_rejected_credentials_surface_distinctly() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    mount_login(&primary, ResponseTemplate::new(503), 1).await;
    mount_login(&secondary, ResponseTemplate::new(401), 1).await;

    let session = session(vec![endpoint_of(&primary), endpoint_of(&secondary)]);
    let result = session.login().await;

    assert!(
        matches!(result, Err(ref e) if e.is_invalid_credentials()),
        "expected InvalidCredentials, got: {result:?}"
    );
}

// ── Token reuse ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_ensure_token_reuses_stored_token() {
    let server = MockServer::start().await;

    mount_login(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-1" })),
        1,
    )
    .await;

    let session = session(vec![endpoint_of(&server)]);

    let first = session.ensure_token().await.unwrap();
    let second = session.ensure_token().await.unwrap();

    assert_eq!(first.token.expose_secret(), second.token.expose_secret());
    assert!(session.has_token().await);
}

#[tokio::test]
async fn test_failed_relogin_leaves_no_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/customer/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-1" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/customer/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let session = session(vec![endpoint_of(&server)]);
    session.ensure_token().await.unwrap();

    let result = session.login().await;
    assert!(
        matches!(result, Err(Error::InvalidCredentials { .. })),
        "expected InvalidCredentials, got: {result:?}"
    );
    assert!(!session.has_token().await);
    assert_eq!(session.endpoint().await, Some(endpoint_of(&server)));
}
