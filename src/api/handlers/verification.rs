//! Verification handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::{debug, instrument};

use super::json_body;
use crate::api::error::{missing_field, ApiError};
use crate::api::types::{VerifyPathRequest, VerifyPathResponse, VerifyRequest};
use crate::domain::VerificationOutcome;
use crate::infra::verify_path;
use crate::server::AppState;

/// POST /api/v1/verify - Verify a certificate
/// against its global anchor.
///
/// Every outcome, including a mismatch, is a 200 response.
#[instrument(skip(state, body))]
pub async fn verify_certificate(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerificationOutcome>, ApiError> {
    let request = json_body(body)?;
    if request.cert_id.trim().is_empty() {
        return Err(missing_field("certID"));
    }

    let outcome = state
        .verifier
        .verify(&request.cert_id, request.global_root_id.as_deref())
        .await?;
    debug!(cert_id = %request.cert_id, verified = outcome.is_verified(), "Verification finished");
    Ok(Json(outcome))
}

/// POST /api/v1/proofs/verify (also POST /VerifyPath) - Check a leaf/path/root triple offline.
pub async fn verify_proof_path(
    body: Result<Json<VerifyPathRequest>, JsonRejection>,
) -> Result<Json<VerifyPathResponse>, ApiError> {
    let request = json_body(body)?;
    Ok(Json(VerifyPathResponse {
        valid: verify_path(&request.proof, &request.merkle_tree_root),
    }))
}
