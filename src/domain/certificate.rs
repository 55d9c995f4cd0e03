//! Locally issued certificates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coordinates proving a certificate's issuance was committed to its local chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalChainProof {
    #[serde(rename = "localChainID")]
    pub local_chain_id: String,

    #[serde(rename = "localChainTxHash")]
    pub local_chain_tx_hash: String,

    #[serde(rename = "localChainBlockNum")]
    pub local_chain_block_num: i64,

    /// Unix seconds
    #[serde(rename = "localChainTimeStamp")]
    pub local_chain_timestamp: i64,
}

/// Certificate as submitted for issuance, before any chain has seen it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCertificate {
    #[serde(rename = "certID")]
    pub cert_id: String,
    #[serde(rename = "personID")]
    pub person_id: String,
    pub name: String,
    pub brand: String,
    pub num_of_dose: u32,
    pub issue_time: DateTime<Utc>,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub remark: String,
}

/// Append-only certificate record in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCertificate {
    #[serde(rename = "certID")]
    pub cert_id: String,
    #[serde(rename = "personID")]
    pub person_id: String,
    pub name: String,
    pub brand: String,
    pub num_of_dose: u32,
    pub issue_time: DateTime<Utc>,
    pub issuer: String,
    pub remark: String,

    /// Filled exactly once, when the local chain confirms issuance
    #[serde(flatten)]
    pub local_chain: Option<LocalChainProof>,
}

impl LocalCertificate {
    /// Whether the local chain has confirmed this certificate.
    ///
    /// Only confirmed certificates may be globally anchored.
    pub fn is_locally_committed(&self) -> bool {
        self.local_chain.is_some()
    }
}

impl From<NewCertificate> for LocalCertificate {
    fn from(new: NewCertificate) -> Self {
        Self {
            cert_id: new.cert_id,
            person_id: new.person_id,
            name: new.name,
            brand: new.brand,
            num_of_dose: new.num_of_dose,
            issue_time: new.issue_time,
            issuer: new.issuer,
            remark: new.remark,
            local_chain: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> NewCertificate {
        NewCertificate {
            cert_id: "cert-001".to_string(),
            person_id: "person-42".to_string(),
            name: "Ada".to_string(),
            brand: "BrandX".to_string(),
            num_of_dose: 2,
            issue_time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            issuer: "clinic-7".to_string(),
            remark: String::new(),
        }
    }

    #[test]
    fn test_new_certificate_starts_unconfirmed() {
        let cert = LocalCertificate::from(sample());
        assert!(!cert.is_locally_committed());
        assert_eq!(cert.cert_id, "cert-001");
    }

    #[test]
    fn test_local_chain_fields_flatten_into_record() {
        let mut cert = LocalCertificate::from(sample());
        cert.local_chain = Some(LocalChainProof {
            local_chain_id: "L1".to_string(),
            local_chain_tx_hash: "0xabc".to_string(),
            local_chain_block_num: 12,
            local_chain_timestamp: 1_709_294_400,
        });

        let json = serde_json::to_value(&cert).unwrap();
        assert_eq!(json["certID"], "cert-001");
        assert_eq!(json["numOfDose"], 2);
        assert_eq!(json["localChainID"], "L1");
        assert_eq!(json["localChainBlockNum"], 12);

        let back: LocalCertificate = serde_json::from_value(json).unwrap();
        assert_eq!(back, cert);
    }
}
