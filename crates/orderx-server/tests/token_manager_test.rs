use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use orderx_server::domain::Platform;
use orderx_server::token_manager::{OAuthClient, TokenError, TokenManager};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn manager(server: &MockServer) -> TokenManager {
    let mut clients = HashMap::new();
    clients.insert(
        Platform::UberEats,
        OAuthClient {
            client_id: "client".into(),
            client_secret: "secret".into(),
            scope: "eats.store".into(),
            token_url: format!("{}/oauth/v2/token", server.uri()),
        },
    );
    TokenManager::new(reqwest::Client::new(), clients, Duration::from_secs(5))
}

fn token(access_token: &str, expires_in: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": access_token,
        "expires_in": expires_in,
        "token_type": "Bearer",
        "scope": "eats.store"
    }))
}

#[tokio::test]
async fn test_concurrent_callers_share_one_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(token("tok-1", 3600).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager(&server);
    let calls = (0..16).map(|_| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.get_token(Platform::UberEats).await })
    });
    let tokens = join_all(calls).await;

    for token in tokens {
        assert_eq!(token.unwrap().unwrap(), "tok-1");
    }
    server.verify().await;
}

#[tokio::test]
async fn test_fresh_token_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token("tok-1", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager(&server);
    assert_eq!(manager.get_token(Platform::UberEats).await.unwrap(), "tok-1");
    assert_eq!(manager.get_token(Platform::UberEats).await.unwrap(), "tok-1");

    let status = manager.status(Platform::UberEats);
    assert!(status.configured);
    assert!(status.cached);
    assert!(status.valid_until.is_some());
    assert!(!status.refreshing);
}

#[tokio::test]
async fn test_short_lived_token_is_cached_before_halfway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token("short-lived", 240))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager(&server);
    assert_eq!(manager.get_token(Platform::UberEats).await.unwrap(), "short-lived");
    assert!(!manager.needs_refresh(Platform::UberEats));
    assert_eq!(manager.get_token(Platform::UberEats).await.unwrap(), "short-lived");
    server.verify().await;
}

#[tokio::test]
async fn test_token_inside_refresh_margin_is_refetched() {
    let server = MockServer::start().await;
    // Four seconds of lifetime, so it turns stale after two.
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token("short-lived", 4))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token("tok-2", 3600))
        .mount(&server)
        .await;

    let manager = manager(&server);
    assert_eq!(manager.get_token(Platform::UberEats).await.unwrap(), "short-lived");
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(manager.needs_refresh(Platform::UberEats));
    assert_eq!(manager.get_token(Platform::UberEats).await.unwrap(), "tok-2");
    assert!(!manager.needs_refresh(Platform::UberEats));
}

#[tokio::test]
async fn test_failed_refresh_keeps_unexpired_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token("short-lived", 4))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(ResponseTemplate::new(500).set_body_string("provider down"))
        .mount(&server)
        .await;

    let manager = manager(&server);
    manager.get_token(Platform::UberEats).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(manager.get_token(Platform::UberEats).await.unwrap(), "short-lived");

    let err = manager.force_refresh(Platform::UberEats).await.unwrap_err();
    assert!(matches!(err, TokenError::FetchFailed { status: Some(500), .. }));
    assert!(manager.status(Platform::UberEats).cached);
}

#[tokio::test]
async fn test_first_fetch_failure_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let manager = manager(&server);
    let err = manager.get_token(Platform::UberEats).await.unwrap_err();
    assert!(matches!(
        err,
        TokenError::FetchFailed {
            platform: Platform::UberEats,
            status: Some(401),
            ..
        }
    ));
    assert!(!manager.status(Platform::UberEats).cached);
}

#[tokio::test]
async fn test_force_refresh_replaces_and_invalidate_clears() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token("tok-1", 3600))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token("tok-2", 3600))
        .mount(&server)
        .await;

    let manager = manager(&server);
    assert_eq!(manager.get_token(Platform::UberEats).await.unwrap(), "tok-1");
    assert_eq!(manager.force_refresh(Platform::UberEats).await.unwrap(), "tok-2");
    assert_eq!(manager.get_token(Platform::UberEats).await.unwrap(), "tok-2");

    manager.invalidate(Platform::UberEats);
    assert!(!manager.status(Platform::UberEats).cached);
    assert!(manager.needs_refresh(Platform::UberEats));
}
