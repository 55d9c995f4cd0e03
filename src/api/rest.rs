//! REST API endpoints for the certificate anchoring service.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::*;
use crate::server::AppState;

/// Build the `/api` router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Ledger assets
        .route("/v1/assets", get(list_assets))
        .route("/v1/assets/:global_root_id", get(get_asset))
        // Verification
        .route("/v1/verify", post(verify_certificate))
        .route("/v1/proofs/verify", post(verify_proof_path))
        // Certificates
        .route("/v1/certificates", post(issue_certificate))
        .route("/v1/certificates/:cert_id", get(get_certificate))
        .route(
            "/v1/certificates/:cert_id/local-chain-proof",
            post(record_local_chain_proof),
        )
        // Anchoring
        .route("/v1/anchor", post(anchor))
        .route("/v1/anchor/pending", get(get_pending))
        .route("/v1/anchor/reconcile", post(reconcile))
        .route("/v1/batches/:global_root_id", get(get_batch))
}

/// Routes kept at the root under their contract-style names.
pub fn legacy_router() -> Router<AppState> {
    Router::new()
        .route("/GetAllAssets", get(get_all_assets_legacy))
        .route("/VerifyPath", post(verify_proof_path))
}
