//! Certificate Anchoring Library
//!
//! Anchors batches of locally issued certificates into a global ledger. Each
//! batch is committed as a single Merkle root; any certificate can later be
//! verified against the root the ledger recorded.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (certificates, batches, assets, proofs)
//! - [`crypto`] - Leaf hashing and Merkle trees
//! - [`ledger`] - Asset contract and the in-process ledger platform
//! - [`anchor`] - Gateway submitting contract transactions to the ledger
//! - [`infra`] - Local store, anchoring coordinator, verifier and worker
//! - [`telemetry`] - Structured logging setup
//! - [`api`] - REST API routes
//! - [`server`] - HTTP server bootstrap

pub mod anchor;
pub mod api;
pub mod crypto;
pub mod domain;
pub mod infra;
pub mod ledger;
pub mod migrations;
pub mod server;
pub mod telemetry;

// Re-export commonly used types
pub use domain::{
    Asset, GlobalAnchorBatch, GlobalChainProof, Hash256, LocalCertificate, LocalChainProof,
    MerkleProof, NewCertificate, VerificationOutcome,
};

pub use infra::{AnchorCoordinator, AnchorError, Result, Verifier};
