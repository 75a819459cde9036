use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::domain::{IngestOutcome, OrderEventKind, WebhookRoute};
use crate::error::Result;
use crate::AppState;

#[derive(Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub event_type: String,
    pub outcome: &'static str,
}

fn outcome_label(outcome: &IngestOutcome) -> &'static str {
    match outcome {
        IngestOutcome::Order(order) if order.kind == OrderEventKind::Cancelled => "order_cancelled",
        IngestOutcome::Order(_) => "order_placed",
        IngestOutcome::CatalogImport(_) => "catalog_import",
        IngestOutcome::Acknowledged { .. } => "ignored",
    }
}

async fn receive(state: &AppState, route: WebhookRoute, headers: &HeaderMap, body: Bytes) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get(route.signature_header())
        .and_then(|v| v.to_str().ok());

    let receipt = state.pipeline.ingest(route, signature, body).await?;

    Ok(Json(WebhookAck {
        status: "accepted",
        outcome: outcome_label(&receipt.outcome),
        event_id: receipt.event_id,
        event_type: receipt.event_type,
    }))
}

pub async fn ubereats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    receive(&state, WebhookRoute::UberEats, &headers, body).await
}

pub async fn foodpanda(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    receive(&state, WebhookRoute::Foodpanda, &headers, body).await
}

pub async fn foodpanda_catalog_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    receive(&state, WebhookRoute::FoodpandaCatalogCallback, &headers, body).await
}
