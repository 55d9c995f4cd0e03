//! REST API integration tests.
//!
//! Drive the full router in-process with `tower::ServiceExt::oneshot`, backed
//! by an in-memory SQLite store and a fresh ledger.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use cert_anchor::server::{build_router, AppState};

use common::*;

// ============================================================================
// Test Helpers
// ============================================================================

async fn create_test_app() -> Router {
    let (store, gateway) = test_stack().await;
    let state = AppState::new(store, gateway, fast_config());
    build_router().unwrap().with_state(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn certificate_body(cert_id: &str) -> Value {
    json!({
        "certID": cert_id,
        "personID": format!("person-{cert_id}"),
        "name": "Test Person",
        "brand": "BrandX",
        "numOfDose": 2,
        "issueTime": "2024-03-01T09:30:00Z",
        "issuer": "clinic-1"
    })
}

fn proof_body(local_chain_id: &str, block_num: i64) -> Value {
    json!({
        "localChainID": local_chain_id,
        "localChainTxHash": format!("0x{block_num:04x}"),
        "localChainBlockNum": block_num,
        "localChainTimeStamp": 1_709_285_400 + block_num
    })
}

async fn issue_and_confirm(app: &Router, cert_id: &str, local_chain_id: &str, block_num: i64) {
    let (status, _) = send(
        app,
        Method::POST,
        "/api/v1/certificates",
        Some(certificate_body(cert_id)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        Method::POST,
        &format!("/api/v1/certificates/{cert_id}/local-chain-proof"),
        Some(proof_body(local_chain_id, block_num)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["localChainID"], local_chain_id);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_and_readiness() {
    let app = create_test_app().await;

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

// ============================================================================
// Anchoring flow
// ============================================================================

#[tokio::test]
async fn test_issue_anchor_and_verify_flow() {
    let app = create_test_app().await;

    issue_and_confirm(&app, "c2", "L1", 11).await;
    issue_and_confirm(&app, "c1", "L1", 10).await;

    let (status, pending) = send(&app, Method::GET, "/api/v1/anchor/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["localChains"], json!(["L1"]));

    let (status, anchored) = send(
        &app,
        Method::POST,
        "/api/v1/anchor",
        Some(json!({ "localChainID": "L1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(anchored["anchored"], 1);
    let receipt = &anchored["receipts"][0];
    let global_root_id = receipt["globalRootID"].as_str().unwrap().to_string();
    assert_eq!(receipt["certCount"], 2);

    // Legacy listing is a bare array
    let (status, assets) = send(&app, Method::GET, "/GetAllAssets", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assets.as_array().unwrap().len(), 1);
    assert_eq!(assets[0]["globalRootID"], global_root_id.as_str());

    let (status, listing) = send(&app, Method::GET, "/api/v1/assets", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["count"], 1);

    let (status, asset) = send(
        &app,
        Method::GET,
        &format!("/api/v1/assets/{global_root_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(asset["merkleTreeRoot"], receipt["merkleTreeRoot"]);

    let (status, batch) = send(
        &app,
        Method::GET,
        &format!("/api/v1/batches/{global_root_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch["certIDList"], json!(["c1", "c2"]));

    let (status, outcome) = send(
        &app,
        Method::POST,
        "/api/v1/verify",
        Some(json!({ "certID": "c2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "verified");
    assert_eq!(outcome["globalRootID"], global_root_id.as_str());

    let (_, outcome) = send(
        &app,
        Method::POST,
        "/api/v1/verify",
        Some(json!({ "certID": "c1", "globalRootID": global_root_id })),
    )
    .await;
    let proof = outcome["proof"].clone();
    let root = outcome["merkleTreeRoot"].clone();

    // Both path-check routes answer the same way
    for uri in ["/VerifyPath", "/api/v1/proofs/verify"] {
        let (status, checked) = send(
            &app,
            Method::POST,
            uri,
            Some(json!({ "proof": proof, "merkleTreeRoot": root })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(checked["valid"], true);
    }

    let (_, checked) = send(
        &app,
        Method::POST,
        "/api/v1/proofs/verify",
        Some(json!({ "proof": proof, "merkleTreeRoot": "00".repeat(32) })),
    )
    .await;
    assert_eq!(checked["valid"], false);

    let (status, report) = send(&app, Method::POST, "/api/v1/anchor/reconcile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["examined"], 0);
}

#[tokio::test]
async fn test_anchor_without_chain_anchors_everything() {
    let app = create_test_app().await;
    issue_and_confirm(&app, "a1", "L1", 1).await;
    issue_and_confirm(&app, "b1", "L2", 1).await;

    let (status, anchored) = send(&app, Method::POST, "/api/v1/anchor", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(anchored["anchored"], 2);

    let (_, anchored) = send(&app, Method::POST, "/api/v1/anchor", Some(json!({}))).await;
    assert_eq!(anchored["anchored"], 0);
}

#[tokio::test]
async fn test_unanchored_certificate_verifies_as_not_anchored() {
    let app = create_test_app().await;
    issue_and_confirm(&app, "c1", "L1", 1).await;

    let (status, outcome) = send(
        &app,
        Method::POST,
        "/api/v1/verify",
        Some(json!({ "certID": "c1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "not_anchored");
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_error_envelope_and_codes() {
    let app = create_test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/assets/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "ASSET_NOT_FOUND");
    assert_eq!(body["error"]["resource_id"], "missing");

    let (status, body) = send(&app, Method::GET, "/api/v1/certificates/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "CERTIFICATE_NOT_FOUND");

    let (status, body) = send(&app, Method::GET, "/api/v1/batches/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "BATCH_NOT_FOUND");

    let (status, body) = send(&app, Method::POST, "/api/v1/verify", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_REQUIRED_FIELD");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/certificates",
        Some(json!({ "certID": "c1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST_BODY");
}

#[tokio::test]
async fn test_write_once_conflicts() {
    let app = create_test_app().await;
    issue_and_confirm(&app, "c1", "L1", 1).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/certificates",
        Some(certificate_body("c1")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CERTIFICATE_EXISTS");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/certificates/c1/local-chain-proof",
        Some(proof_body("L1", 2)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_CONFIRMED");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/certificates/ghost/local-chain-proof",
        Some(proof_body("L1", 2)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "CERTIFICATE_NOT_FOUND");
}
