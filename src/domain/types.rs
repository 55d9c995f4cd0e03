//! Core type definitions shared across the crate

/// 32-byte hash (SHA-256)
pub type Hash256 = [u8; 32];

/// Render a hash as lowercase hex, the form stored in `merkleTreeRoot`.
pub fn hash_to_hex(hash: &Hash256) -> String {
    hex::encode(hash)
}

/// Parse a 32-byte hash from hex, tolerating a `0x` prefix.
pub fn hash_from_hex(s: &str) -> Option<Hash256> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).ok()?;
    bytes.try_into().ok()
}

/// Serde module for serializing Hash256 as hex strings
pub mod hash256_hex {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::hash_from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom("expected 32 hex-encoded bytes for Hash256"))
    }
}

/// Serde module for a list of Hash256 as hex strings
pub mod hash256_hex_vec {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(hashes: &[[u8; 32]], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(hashes.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Vec<String> = Vec::deserialize(deserializer)?;
        raw.iter()
            .map(|s| {
                super::hash_from_hex(s).ok_or_else(|| {
                    serde::de::Error::custom("expected 32 hex-encoded bytes for Hash256")
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_roundtrip_with_prefix() {
        let hash: Hash256 = [0xab; 32];
        let encoded = hash_to_hex(&hash);
        assert_eq!(hash_from_hex(&encoded), Some(hash));
        assert_eq!(hash_from_hex(&format!("0x{encoded}")), Some(hash));
    }

    #[test]
    fn test_hash_from_hex_rejects_wrong_length() {
        assert!(hash_from_hex("deadbeef").is_none());
        assert!(hash_from_hex("not hex").is_none());
    }
}
