//! Property-based tests using proptest.
//!
//! These tests verify invariants that should hold for any valid input.

use proptest::prelude::*;

use cert_anchor::crypto::{compute_merkle_root, prove_inclusion, sort_leaves, verify_inclusion};
use cert_anchor::domain::{hash_from_hex, hash_to_hex, Hash256};
use cert_anchor::infra::verify_path;

// ============================================================================
// Custom Strategies
// ============================================================================

type Leaves = Vec<(String, Hash256)>;

/// Distinct certificate ids paired with arbitrary leaf hashes
fn arb_leaves() -> impl Strategy<Value = Leaves> {
    prop::collection::btree_map("[a-z0-9]{1,12}", any::<[u8; 32]>(), 2..40)
        .prop_map(|m| m.into_iter().collect())
}

/// Leaves together with a shuffled copy
fn arb_leaves_and_permutation() -> impl Strategy<Value = (Leaves, Leaves)> {
    arb_leaves().prop_flat_map(|leaves| {
        let shuffled = Just(leaves.clone()).prop_shuffle();
        (Just(leaves), shuffled)
    })
}

fn hashes(leaves: &[(String, Hash256)]) -> Vec<Hash256> {
    leaves.iter().map(|(_, h)| *h).collect()
}

// ============================================================================
// Merkle properties
// ============================================================================

proptest! {
    #[test]
    fn prop_root_is_independent_of_input_order((leaves, shuffled) in arb_leaves_and_permutation()) {
        let a = compute_merkle_root(&hashes(&sort_leaves(leaves)));
        let b = compute_merkle_root(&hashes(&sort_leaves(shuffled)));
        prop_assert!(a.is_some());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_every_leaf_proves_against_root(leaves in arb_leaves()) {
        let sorted = hashes(&sort_leaves(leaves));
        let root = compute_merkle_root(&sorted).unwrap();

        for index in 0..sorted.len() {
            let proof = prove_inclusion(&sorted, index).unwrap();
            prop_assert_eq!(proof.leaf_hash, sorted[index]);
            prop_assert_eq!(proof.leaf_count, sorted.len());
            prop_assert!(verify_inclusion(&proof, &root));
            prop_assert!(verify_path(&proof, &hash_to_hex(&root)));
        }
    }

    #[test]
    fn prop_altered_leaf_fails_verification(leaves in arb_leaves(), flip in any::<u8>()) {
        let sorted = hashes(&sort_leaves(leaves));
        let root = compute_merkle_root(&sorted).unwrap();

        let mut proof = prove_inclusion(&sorted, 0).unwrap();
        proof.leaf_hash[0] ^= flip | 1;
        prop_assert!(!verify_inclusion(&proof, &root));
    }

    #[test]
    fn prop_hex_round_trip(hash in any::<[u8; 32]>()) {
        let hex = hash_to_hex(&hash);
        prop_assert_eq!(hex.len(), 64);
        prop_assert_eq!(hash_from_hex(&hex), Some(hash));
        prop_assert_eq!(hash_from_hex(&hex.to_uppercase()), Some(hash));
    }
}
