use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{dev, health, sync, tokens, webhooks};
use crate::api::middleware::auth;
use crate::AppState;

async fn fallback() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": {
                "code": "not_found",
                "message": "The requested endpoint does not exist"
            }
        })),
    )
}

pub fn build(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/brands/:brand_id/stores/:store_id/sync", post(sync::sync_store))
        .route(
            "/brands/:brand_id/stores/:store_id/sync/availability",
            post(sync::sync_availability),
        )
        .route(
            "/brands/:brand_id/stores/:store_id/items/:item_id/availability",
            put(sync::set_item_availability),
        )
        .route("/platforms/:platform/token", get(tokens::status))
        .route("/platforms/:platform/token/refresh", post(tokens::refresh))
        .layer(from_fn_with_state(state.clone(), auth::middleware));

    let webhook_routes = Router::new()
        .route("/ubereats", post(webhooks::ubereats))
        .route("/foodpanda", post(webhooks::foodpanda))
        .route("/foodpanda/catalog-callback", post(webhooks::foodpanda_catalog_callback));

    let public = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready));

    let mut api = Router::new()
        .nest("/v1", admin)
        .nest("/webhooks", webhook_routes)
        .merge(public);

    if state.config.environment.allows_dev_routes() {
        api = api.route("/dev/webhooks/:platform/sign", post(dev::sign_webhook));
    }

    // Each outbound call is bounded on its own; this caps the whole request.
    let request_timeout = state.config.outbound_timeout * 2;

    api.fallback(fallback)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout.max(Duration::from_secs(1))))
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
}
