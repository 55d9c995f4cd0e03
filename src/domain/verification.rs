//! Merkle inclusion proofs and verification outcomes

use serde::{Deserialize, Serialize};

use super::{hash256_hex, hash256_hex_vec, Hash256};

/// Merkle inclusion proof for one certificate leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof {
    /// Hash of the certificate leaf
    #[serde(with = "hash256_hex")]
    pub leaf_hash: Hash256,

    /// Sibling hashes from leaf to root
    #[serde(with = "hash256_hex_vec")]
    pub proof_path: Vec<Hash256>,

    /// Index of the leaf in the sorted batch
    pub leaf_index: usize,

    /// Total leaves in the batch (needed to place odd nodes)
    pub leaf_count: usize,
}

impl MerkleProof {
    pub fn new(
        leaf_hash: Hash256,
        proof_path: Vec<Hash256>,
        leaf_index: usize,
        leaf_count: usize,
    ) -> Self {
        Self {
            leaf_hash,
            proof_path,
            leaf_index,
            leaf_count,
        }
    }
}

/// Result of verifying a certificate against its global anchor.
///
/// Every variant is a normal answer; none of them is a system error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The recomputed root matches the ledger asset
    Verified {
        #[serde(rename = "certID")]
        cert_id: String,
        #[serde(rename = "globalRootID")]
        global_root_id: String,
        #[serde(rename = "merkleTreeRoot")]
        merkle_tree_root: String,
        proof: MerkleProof,
    },

    /// The recomputed root differs from the ledger asset
    RootMismatch {
        #[serde(rename = "certID")]
        cert_id: String,
        #[serde(rename = "globalRootID")]
        global_root_id: String,
        #[serde(rename = "ledgerRoot")]
        ledger_root: String,
        #[serde(rename = "computedRoot")]
        computed_root: String,
    },

    /// The certificate is not part of any anchor batch yet
    NotAnchored {
        #[serde(rename = "certID")]
        cert_id: String,
    },

    /// The ledger has no asset for the batch's global root
    NotFound {
        #[serde(rename = "globalRootID")]
        global_root_id: String,
    },
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified { .. })
    }
}
