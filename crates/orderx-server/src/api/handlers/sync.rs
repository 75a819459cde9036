use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::domain::{ItemAvailabilityRequest, SyncResult};
use crate::error::Result;
use crate::AppState;

pub async fn sync_store(
    State(state): State<Arc<AppState>>,
    Path((brand_id, store_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<SyncResult>>> {
    let results = state.orchestrator.sync_store(brand_id, store_id).await?;
    Ok(Json(results))
}

pub async fn sync_availability(
    State(state): State<Arc<AppState>>,
    Path((brand_id, store_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<SyncResult>>> {
    let results = state.orchestrator.sync_availability(brand_id, store_id).await?;
    Ok(Json(results))
}

pub async fn set_item_availability(
    State(state): State<Arc<AppState>>,
    Path((brand_id, store_id, item_id)): Path<(Uuid, Uuid, String)>,
    Json(req): Json<ItemAvailabilityRequest>,
) -> Result<Json<Vec<SyncResult>>> {
    let results = state
        .orchestrator
        .set_item_availability(brand_id, store_id, &item_id, req.suspended)
        .await?;
    Ok(Json(results))
}
