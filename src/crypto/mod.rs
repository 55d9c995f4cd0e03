//! Cryptographic utilities for certificate anchoring
//!
//! Provides:
//! - Domain-separated certificate leaf hashing
//! - Merkle tree roots and inclusion proofs over sorted certificate batches

mod hash;
mod merkle;

pub use hash::*;
pub use merkle::*;
