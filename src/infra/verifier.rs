//! Certificate verification against global anchors
//!
//! Rebuilds a certificate's Merkle path from its batch membership, recomputes
//! the root and compares it with the root the ledger recorded. Every answer is
//! a [`VerificationOutcome`]; only infrastructure failures are errors.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::crypto::{
    certificate_leaf_hash, compute_merkle_root, prove_inclusion, sort_leaves, verify_inclusion,
};
use crate::domain::{
    hash_from_hex, hash_to_hex, GlobalAnchorBatch, Hash256, MerkleProof, VerificationOutcome,
};

use super::{LedgerGateway, LocalStore, Result};

/// Verification endpoint backend
pub struct Verifier<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
}

impl<S, G> Verifier<S, G>
where
    S: LocalStore,
    G: LedgerGateway,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>) -> Self {
        Self { store, gateway }
    }

    /// Verify that `cert_id` is included in an anchored global root.
    ///
    /// Without `global_root_id` the certificate's own batch is used. Naming
    /// any other root checks it against the ledger: an unknown root is
    /// `NotFound`, a known one cannot hold the certificate and is a mismatch.
    #[instrument(skip(self))]
    pub async fn verify(
        &self,
        cert_id: &str,
        global_root_id: Option<&str>,
    ) -> Result<VerificationOutcome> {
        let not_anchored = || VerificationOutcome::NotAnchored {
            cert_id: cert_id.to_string(),
        };

        let Some(batch) = self.store.find_batch_for_certificate(cert_id).await? else {
            debug!("Certificate is not in any batch");
            return Ok(not_anchored());
        };
        if batch.leaf_index(cert_id).is_none() {
            return Ok(not_anchored());
        }

        if let Some(named) = global_root_id.filter(|id| *id != batch.global_root_id) {
            return self.verify_against_other_root(cert_id, named, &batch).await;
        }

        let Some(asset) = self.gateway.read_asset(&batch.global_root_id).await? else {
            warn!(global_root_id = %batch.global_root_id, "Batch has no asset on the ledger");
            return Ok(VerificationOutcome::NotFound {
                global_root_id: batch.global_root_id,
            });
        };

        // Members that lost their local proof contribute no leaf, which
        // surfaces as a root mismatch rather than an error.
        let certs = self.store.get_certificates(&batch.cert_id_list).await?;
        let leaves = sort_leaves(
            certs
                .iter()
                .filter_map(|cert| {
                    let proof = cert.local_chain.as_ref()?;
                    Some((cert.cert_id.clone(), certificate_leaf_hash(cert, proof)))
                })
                .collect(),
        );

        let Some(leaf_index) = leaves.iter().position(|(id, _)| id == cert_id) else {
            return Ok(not_anchored());
        };
        let hashes: Vec<Hash256> = leaves.iter().map(|(_, h)| *h).collect();

        let computed_root = compute_merkle_root(&hashes);
        let proof = prove_inclusion(&hashes, leaf_index);

        match (computed_root, proof) {
            (Some(root), Some(proof))
                if asset.has_root(&hash_to_hex(&root)) && verify_inclusion(&proof, &root) =>
            {
                Ok(VerificationOutcome::Verified {
                    cert_id: cert_id.to_string(),
                    global_root_id: batch.global_root_id,
                    merkle_tree_root: asset.merkle_tree_root,
                    proof,
                })
            }
            (root, _) => {
                let computed_root = root.map(|r| hash_to_hex(&r)).unwrap_or_default();
                warn!(
                    global_root_id = %batch.global_root_id,
                    ledger_root = %asset.merkle_tree_root,
                    computed_root = %computed_root,
                    "Recomputed root does not match ledger"
                );
                Ok(VerificationOutcome::RootMismatch {
                    cert_id: cert_id.to_string(),
                    global_root_id: batch.global_root_id,
                    ledger_root: asset.merkle_tree_root,
                    computed_root,
                })
            }
        }
    }

    /// A certificate belongs to one batch, so a different named root never
    /// includes it.
    async fn verify_against_other_root(
        &self,
        cert_id: &str,
        named: &str,
        own: &GlobalAnchorBatch,
    ) -> Result<VerificationOutcome> {
        let Some(asset) = self.gateway.read_asset(named).await? else {
            debug!(global_root_id = named, "Named root is not on the ledger");
            return Ok(VerificationOutcome::NotFound {
                global_root_id: named.to_string(),
            });
        };

        warn!(
            global_root_id = named,
            anchored_in = %own.global_root_id,
            "Certificate is anchored under a different root"
        );
        Ok(VerificationOutcome::RootMismatch {
            cert_id: cert_id.to_string(),
            global_root_id: named.to_string(),
            ledger_root: asset.merkle_tree_root,
            computed_root: own.merkle_tree_root.clone(),
        })
    }
}

/// Check a supplied leaf / path / root triple without touching any store
pub fn verify_path(proof: &MerkleProof, merkle_tree_root: &str) -> bool {
    hash_from_hex(merkle_tree_root)
        .map(|root| verify_inclusion(proof, &root))
        .unwrap_or(false)
}
