#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use orderx_server::collaborators::InMemoryStore;
use orderx_server::config::{Config, Environment, LogFormat, PlatformConfig, WebhookSettings};
use orderx_server::domain::{OperationalStatus, Platform, PlatformSpecific, PlatformStoreBinding};
use orderx_server::{App, Collaborators};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ADMIN_TOKEN: &str = "admin-test-token";
pub const UBER_SECRET: &str = "s3cret";

fn platform_config(base: &str, platform: Platform, webhook_secret: Option<&str>) -> PlatformConfig {
    PlatformConfig {
        client_id: Some(format!("{platform}-client")),
        client_secret: Some(format!("{platform}-secret")),
        scope: "test.scope".into(),
        auth_url: format!("{base}/{platform}/oauth/v2/token"),
        api_url: format!("{base}/{platform}"),
        webhook_secret: webhook_secret.map(str::to_string),
        webhook_secret_secondary: None,
    }
}

/// Both platforms point at `base`, under `/ubereats` and `/foodpanda`.
pub fn config(base: &str) -> Config {
    Config {
        database_url: String::new(),
        bind_address: "127.0.0.1:0".into(),
        db_max_connections: 1,
        otlp_endpoint: None,
        log_format: LogFormat::Json,
        environment: Environment::Test,
        admin_api_token: Some(ADMIN_TOKEN.into()),
        public_base_url: "http://orderx.test".into(),
        outbound_timeout: Duration::from_secs(5),
        token_refresh_interval: Duration::ZERO,
        webhooks: WebhookSettings {
            max_skew_secs: 300,
            dedup_capacity: 10_000,
            dedup_ttl: Duration::from_secs(3600),
        },
        ubereats: platform_config(base, Platform::UberEats, Some(UBER_SECRET)),
        foodpanda: platform_config(base, Platform::Foodpanda, None),
    }
}

pub struct TestApp {
    pub app: App,
    pub router: Router,
    pub store: Arc<InMemoryStore>,
}

pub fn setup_with(config: Config) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let app = App::from_parts(config, Collaborators::from_store(store.clone())).expect("Failed to create app");
    let router = app.router();
    TestApp { app, router, store }
}

pub fn setup(server: &MockServer) -> TestApp {
    setup_with(config(&server.uri()))
}

pub async fn mount_token(server: &MockServer, platform: Platform) {
    Mock::given(method("POST"))
        .and(path(format!("/{platform}/oauth/v2/token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": format!("{platform}-token"),
            "expires_in": 2_592_000,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

pub fn binding(brand_id: Uuid, store_id: Uuid, platform: Platform, external_store_id: &str) -> PlatformStoreBinding {
    PlatformStoreBinding {
        id: Uuid::new_v4(),
        brand_id,
        store_id,
        platform,
        external_store_id: external_store_id.into(),
        operational_status: OperationalStatus::Online,
        prep_time_minutes: 15,
        auto_accept: true,
        platform_specific: match platform {
            Platform::UberEats => PlatformSpecific::UberEats { menu_id: None },
            Platform::Foodpanda => PlatformSpecific::Foodpanda {
                chain_code: "chain-1".into(),
            },
        },
        active: true,
        last_synced_at: None,
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let res = router.clone().oneshot(request).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

pub fn admin(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", ADMIN_TOKEN));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
