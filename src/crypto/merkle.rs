//! Merkle trees over certificate batches
//!
//! Leaves are ordered by certID before the tree is built, so a batch always
//! yields the same root no matter how its members were listed.

use rs_merkle::{algorithms::Sha256, MerkleTree};

use crate::domain::{Hash256, MerkleProof};

/// Order `(cert_id, leaf)` pairs by certID and drop duplicate certIDs.
pub fn sort_leaves(mut leaves: Vec<(String, Hash256)>) -> Vec<(String, Hash256)> {
    leaves.sort_by(|a, b| a.0.cmp(&b.0));
    leaves.dedup_by(|a, b| a.0 == b.0);
    leaves
}

fn build_merkle_tree(leaves: &[Hash256]) -> MerkleTree<Sha256> {
    MerkleTree::<Sha256>::from_leaves(leaves)
}

/// Compute the Merkle root over already-sorted leaves.
///
/// Returns `None` for an empty batch; an empty batch is never anchored.
pub fn compute_merkle_root(leaves: &[Hash256]) -> Option<Hash256> {
    if leaves.is_empty() {
        return None;
    }
    build_merkle_tree(leaves).root()
}

/// Generate the inclusion proof for `leaf_index`.
pub fn prove_inclusion(leaves: &[Hash256], leaf_index: usize) -> Option<MerkleProof> {
    let leaf = *leaves.get(leaf_index)?;
    let tree = build_merkle_tree(leaves);
    let proof = tree.proof(&[leaf_index]);

    Some(MerkleProof::new(
        leaf,
        proof.proof_hashes().to_vec(),
        leaf_index,
        leaves.len(),
    ))
}

/// Check an inclusion proof against a root.
///
/// A malformed proof (index out of range, wrong path length) verifies false.
pub fn verify_inclusion(proof: &MerkleProof, root: &Hash256) -> bool {
    if proof.leaf_count == 0 || proof.leaf_index >= proof.leaf_count {
        return false;
    }

    let rs_proof = rs_merkle::MerkleProof::<Sha256>::new(proof.proof_path.clone());
    rs_proof.verify(
        *root,
        &[proof.leaf_index],
        &[proof.leaf_hash],
        proof.leaf_count,
    )
}
