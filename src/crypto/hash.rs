//! Domain-separated hashing
//!
//! Every hash carries a domain prefix and every variable-length field is
//! length-prefixed, so two different certificates can never produce the same
//! preimage.

use sha2::{Digest, Sha256};

use crate::domain::{Hash256, LocalCertificate, LocalChainProof};

/// Domain prefix for certificate Merkle leaves
pub const DOMAIN_CERT_LEAF: &[u8] = b"CERT_ANCHOR_LEAF_V1";

/// Domain prefix for ledger transaction identifiers
pub const DOMAIN_TX_ID: &[u8] = b"CERT_ANCHOR_TX_V1";

/// Domain prefix for ledger block hashes
pub const DOMAIN_BLOCK: &[u8] = b"CERT_ANCHOR_BLOCK_V1";

/// Encode a u32 as 4 bytes big-endian
#[inline]
pub fn u32_be(n: u32) -> [u8; 4] {
    n.to_be_bytes()
}

/// Encode an i64 as 8 bytes big-endian
#[inline]
pub fn i64_be(n: i64) -> [u8; 8] {
    n.to_be_bytes()
}

/// Encode a string as length-prefixed UTF-8 bytes
/// Format: U32_BE(len) || UTF8_bytes
pub fn encode_string(s: &str) -> Vec<u8> {
    let utf8_bytes = s.as_bytes();
    let mut result = Vec::with_capacity(4 + utf8_bytes.len());
    result.extend_from_slice(&u32_be(utf8_bytes.len() as u32));
    result.extend_from_slice(utf8_bytes);
    result
}

/// Compute the Merkle leaf for a locally committed certificate
///
/// ```text
/// leaf = SHA256(
///   b"CERT_ANCHOR_LEAF_V1" ||
///   ENC_STR(certID) || ENC_STR(personID) || ENC_STR(name) || ENC_STR(brand) ||
///   U32_BE(numOfDose) || I64_BE(issueTime unix seconds) ||
///   ENC_STR(localChainID) || ENC_STR(localChainTxHash) ||
///   I64_BE(localChainBlockNum) || I64_BE(localChainTimeStamp)
/// )
/// ```
///
/// `issuer` and `remark` are descriptive and stay out of the leaf.
pub fn certificate_leaf_hash(cert: &LocalCertificate, proof: &LocalChainProof) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_CERT_LEAF);
    hasher.update(encode_string(&cert.cert_id));
    hasher.update(encode_string(&cert.person_id));
    hasher.update(encode_string(&cert.name));
    hasher.update(encode_string(&cert.brand));
    hasher.update(u32_be(cert.num_of_dose));
    hasher.update(i64_be(cert.issue_time.timestamp()));
    hasher.update(encode_string(&proof.local_chain_id));
    hasher.update(encode_string(&proof.local_chain_tx_hash));
    hasher.update(i64_be(proof.local_chain_block_num));
    hasher.update(i64_be(proof.local_chain_timestamp));
    hasher.finalize().into()
}

/// Simple SHA-256 hash
pub fn sha256(data: &[u8]) -> Hash256 {
    Sha256::digest(data).into()
}
