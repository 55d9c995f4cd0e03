//! Ledger-resident anchor record

use serde::{Deserialize, Serialize};

/// Block number written into a freshly created asset.
///
/// The creating transaction cannot know its own block, so the real commit
/// coordinates live in the ledger's commit record for the key.
pub const PLACEHOLDER_BLOCK_NUM: i64 = 1;

/// Global anchor stored in the ledger world state under `globalRootID`.
///
/// Write-once: the contract exposes no update or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(rename = "globalRootID")]
    pub global_root_id: String,

    #[serde(rename = "localChainID")]
    pub local_chain_id: String,

    /// Hex Merkle root over the batch's certificate leaves
    #[serde(rename = "merkleTreeRoot")]
    pub merkle_tree_root: String,

    #[serde(rename = "globalChainTxHash", default)]
    pub global_chain_tx_hash: String,

    #[serde(rename = "globalChainBlockNum", default)]
    pub global_chain_block_num: i64,

    /// Unix seconds
    #[serde(rename = "globalChainTimeStamp", default)]
    pub global_chain_timestamp: i64,
}

impl Asset {
    /// Asset as written by `CreateAsset`: no tx hash, placeholder block, and
    /// the transaction's own timestamp.
    pub fn unanchored(
        global_root_id: impl Into<String>,
        local_chain_id: impl Into<String>,
        merkle_tree_root: impl Into<String>,
        tx_timestamp: i64,
    ) -> Self {
        Self {
            global_root_id: global_root_id.into(),
            local_chain_id: local_chain_id.into(),
            merkle_tree_root: merkle_tree_root.into(),
            global_chain_tx_hash: String::new(),
            global_chain_block_num: PLACEHOLDER_BLOCK_NUM,
            global_chain_timestamp: tx_timestamp,
        }
    }

    /// Whether this asset records exactly `merkle_tree_root`.
    ///
    /// The ledger stores the root as an opaque string; roots built here are
    /// always lowercase hex.
    pub fn has_root(&self, merkle_tree_root: &str) -> bool {
        self.merkle_tree_root == merkle_tree_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_wire_field_names() {
        let asset = Asset::unanchored("G1", "L1", "deadbeef", 1_700_000_000);
        let json = serde_json::to_value(&asset).unwrap();

        assert_eq!(json["globalRootID"], "G1");
        assert_eq!(json["localChainID"], "L1");
        assert_eq!(json["merkleTreeRoot"], "deadbeef");
        assert_eq!(json["globalChainTxHash"], "");
        assert_eq!(json["globalChainBlockNum"], 1);
        assert_eq!(json["globalChainTimeStamp"], 1_700_000_000i64);
    }

    #[test]
    fn test_asset_decode_requires_identifying_fields() {
        let missing_root = r#"{"globalRootID":"G1","localChainID":"L1"}"#;
        assert!(serde_json::from_str::<Asset>(missing_root).is_err());

        let minimal = r#"{"globalRootID":"G1","localChainID":"L1","merkleTreeRoot":"ab"}"#;
        let asset: Asset = serde_json::from_str(minimal).unwrap();
        assert_eq!(asset.global_chain_block_num, 0);
        assert!(asset.global_chain_tx_hash.is_empty());
    }

    #[test]
    fn test_has_root_is_exact() {
        let asset = Asset::unanchored("G1", "L1", "deadbeef", 0);
        assert!(asset.has_root("deadbeef"));
        assert!(!asset.has_root("DEADBEEF"));
        assert!(!asset.has_root("cafebabe"));

        let sentinel = Asset::unanchored("G0", "L0", "merkletreeroot test", 0);
        assert!(sentinel.has_root("merkletreeroot test"));
        assert!(!sentinel.has_root("MerkleTreeRoot Test"));
    }
}
