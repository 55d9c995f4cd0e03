//! Anchoring handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use tracing::{info, instrument};

use super::json_body;
use crate::api::error::{missing_field, not_found, ApiError, ErrorCode};
use crate::api::types::{AnchorRequest, AnchorResponse};
use crate::domain::GlobalAnchorBatch;
use crate::infra::{LocalStore, PendingWork, ReconcileReport};
use crate::server::AppState;

/// POST /api/v1/anchor - Batch and anchor confirmed certificates.
#[instrument(skip(state, body))]
pub async fn anchor(
    State(state): State<AppState>,
    body: Result<Json<AnchorRequest>, JsonRejection>,
) -> Result<Json<AnchorResponse>, ApiError> {
    let request = json_body(body)?;

    let receipts = match request.local_chain_id.as_deref().map(str::trim) {
        Some("") => return Err(missing_field("localChainID")),
        Some(local_chain_id) => state
            .coordinator
            .anchor_chain(local_chain_id)
            .await?
            .into_iter()
            .collect(),
        None => state.coordinator.anchor_pending().await?,
    };

    info!(anchored = receipts.len(), "Anchoring request finished");
    Ok(Json(AnchorResponse {
        anchored: receipts.len(),
        receipts,
    }))
}

/// GET /api/v1/anchor/pending - Work waiting for the coordinator.
#[instrument(skip(state))]
pub async fn get_pending(State(state): State<AppState>) -> Result<Json<PendingWork>, ApiError> {
    Ok(Json(state.coordinator.pending().await?))
}

/// POST /api/v1/anchor/reconcile - Finish batches lacking write-back.
#[instrument(skip(state))]
pub async fn reconcile(
    State(state): State<AppState>,
) -> Result<Json<ReconcileReport>, ApiError> {
    Ok(Json(state.coordinator.reconcile().await?))
}

/// GET /api/v1/batches/:global_root_id - Fetch a recorded batch.
#[instrument(skip(state))]
pub async fn get_batch(
    State(state): State<AppState>,
    Path(global_root_id): Path<String>,
) -> Result<Json<GlobalAnchorBatch>, ApiError> {
    state
        .store
        .get_batch(&global_root_id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(ErrorCode::BatchNotFound, "Batch", &global_root_id))
}
