//! Shared request and response types for REST API handlers.

use serde::{Deserialize, Serialize};

use crate::domain::{Asset, MerkleProof};
use crate::infra::AnchorReceipt;

// ============================================================================
// Verification types
// ============================================================================

/// Request body for certificate verification.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(rename = "certID", default)]
    pub cert_id: String,

    /// Expected batch; defaults to the batch the certificate belongs to
    #[serde(rename = "globalRootID", default)]
    pub global_root_id: Option<String>,
}

/// Request body for offline Merkle path verification.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPathRequest {
    pub proof: MerkleProof,
    pub merkle_tree_root: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyPathResponse {
    pub valid: bool,
}

// ============================================================================
// Anchoring types
// ============================================================================

/// Request body for an anchoring run.
///
/// Without a local chain, every chain with pending certificates is anchored.
#[derive(Debug, Default, Deserialize)]
pub struct AnchorRequest {
    #[serde(rename = "localChainID", default)]
    pub local_chain_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnchorResponse {
    pub anchored: usize,
    pub receipts: Vec<AnchorReceipt>,
}

// ============================================================================
// Asset types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AssetListResponse {
    pub assets: Vec<Asset>,
    pub count: usize,
}

impl From<Vec<Asset>> for AssetListResponse {
    fn from(assets: Vec<Asset>) -> Self {
        Self {
            count: assets.len(),
            assets,
        }
    }
}
