//! Certificate issuance and local-chain confirmation handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{info, instrument};

use super::json_body;
use crate::api::error::{missing_field, not_found, validation_error, ApiError, ErrorCode};
use crate::domain::{LocalCertificate, LocalChainProof, NewCertificate};
use crate::infra::LocalStore;
use crate::server::AppState;

/// POST /api/v1/certificates - Record a newly issued certificate.
#[instrument(skip(state, body))]
pub async fn issue_certificate(
    State(state): State<AppState>,
    body: Result<Json<NewCertificate>, JsonRejection>,
) -> Result<(StatusCode, Json<LocalCertificate>), ApiError> {
    let cert = json_body(body)?;
    if cert.cert_id.trim().is_empty() {
        return Err(missing_field("certID"));
    }
    if cert.person_id.trim().is_empty() {
        return Err(missing_field("personID"));
    }

    let created = state.coordinator.issue_certificate(&cert).await?;
    info!(cert_id = %created.cert_id, "Certificate recorded");
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/certificates/:cert_id - Fetch a certificate.
#[instrument(skip(state))]
pub async fn get_certificate(
    State(state): State<AppState>,
    Path(cert_id): Path<String>,
) -> Result<Json<LocalCertificate>, ApiError> {
    state
        .store
        .get_certificate(&cert_id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(ErrorCode::CertificateNotFound, "Certificate", &cert_id))
}

/// POST /api/v1/certificates/:cert_id/local-chain-proof - Confirm issuance.
#[instrument(skip(state, body))]
pub async fn record_local_chain_proof(
    State(state): State<AppState>,
    Path(cert_id): Path<String>,
    body: Result<Json<LocalChainProof>, JsonRejection>,
) -> Result<Json<LocalCertificate>, ApiError> {
    let proof = json_body(body)?;
    if proof.local_chain_id.trim().is_empty() {
        return Err(missing_field("localChainID"));
    }
    if proof.local_chain_block_num < 0 {
        return Err(validation_error(
            "localChainBlockNum",
            "localChainBlockNum must not be negative",
        ));
    }

    let cert = state.coordinator.confirm_local_commit(&cert_id, &proof).await?;
    Ok(Json(cert))
}
