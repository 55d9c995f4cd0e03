//! Ledger asset handlers.

use axum::extract::{Path, State};
use axum::Json;
use tracing::instrument;

use crate::api::error::{not_found, ApiError, ErrorCode};
use crate::api::types::AssetListResponse;
use crate::domain::Asset;
use crate::infra::LedgerGateway;
use crate::server::AppState;

/// GET /GetAllAssets - Every asset in key order, as a bare array.
#[instrument(skip(state))]
pub async fn get_all_assets_legacy(
    State(state): State<AppState>,
) -> Result<Json<Vec<Asset>>, ApiError> {
    Ok(Json(state.gateway.get_all_assets().await?))
}

/// GET /api/v1/assets - List assets with a count.
#[instrument(skip(state))]
pub async fn list_assets(
    State(state): State<AppState>,
) -> Result<Json<AssetListResponse>, ApiError> {
    let assets = state.gateway.get_all_assets().await?;
    Ok(Json(assets.into()))
}

/// GET /api/v1/assets/:global_root_id - Read one asset.
#[instrument(skip(state))]
pub async fn get_asset(
    State(state): State<AppState>,
    Path(global_root_id): Path<String>,
) -> Result<Json<Asset>, ApiError> {
    state
        .gateway
        .read_asset(&global_root_id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(ErrorCode::AssetNotFound, "Asset", &global_root_id))
}
