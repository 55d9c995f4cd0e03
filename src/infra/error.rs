//! Error types for the anchoring service

use thiserror::Error;

use crate::ledger::{ContractError, ValidationError};

use super::retry::is_retryable_db_error;

/// Errors raised by the local store, the ledger gateway and the coordinator
#[derive(Error, Debug)]
pub enum AnchorError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Contract execution failed during simulation (endorsement failure)
    #[error("contract error: {0}")]
    Contract(#[from] ContractError),

    /// Simulated transaction was rejected at commit validation
    #[error("transaction {tx_id} invalidated: {source}")]
    Validation {
        tx_id: String,
        #[source]
        source: ValidationError,
    },

    /// Transaction was submitted but its commit was never observed
    #[error("commit status unknown for transaction {tx_id}")]
    CommitStatusUnknown { tx_id: String },

    /// Ledger already holds a different root under this globalRootID
    #[error(
        "conflicting anchor for {global_root_id}: ledger has {ledger_root}, local batch has {local_root}"
    )]
    ConflictingAnchor {
        global_root_id: String,
        ledger_root: String,
        local_root: String,
    },

    /// Certificate not found
    #[error("certificate not found: {0}")]
    CertificateNotFound(String),

    /// Certificate already issued
    #[error("certificate already exists: {0}")]
    CertificateExists(String),

    /// Local-chain proof already recorded with different coordinates
    #[error("certificate {0} already has a different local chain proof")]
    AlreadyConfirmed(String),

    /// Certificate has no local-chain proof yet
    #[error("certificate {0} is not committed on its local chain")]
    NotLocallyCommitted(String),

    /// Certificate already belongs to a batch
    #[error("certificate {cert_id} already anchored in batch {global_root_id}")]
    AlreadyBatched {
        cert_id: String,
        global_root_id: String,
    },

    /// Batch not found
    #[error("batch not found: {0}")]
    BatchNotFound(String),

    /// Global-chain proof already recorded with different coordinates
    #[error("batch {0} already has a different global chain proof")]
    AlreadyWrittenBack(String),

    /// Nothing to anchor
    #[error("no confirmed certificates pending for local chain {0}")]
    EmptyBatch(String),

    /// Invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AnchorError {
    /// Whether the ledger rejected the transaction before any state changed.
    ///
    /// These are safe to resubmit unchanged.
    pub fn is_rejected_before_commit(&self) -> bool {
        match self {
            AnchorError::Validation { .. } => true,
            AnchorError::Contract(ContractError::Storage(_)) => true,
            _ => false,
        }
    }

    /// Whether the submission may or may not have landed
    pub fn is_commit_status_unknown(&self) -> bool {
        matches!(self, AnchorError::CommitStatusUnknown { .. })
    }

    /// Local store failure that may succeed on retry (busy, locked, pool timeout)
    pub fn is_transient_store_error(&self) -> bool {
        matches!(self, AnchorError::Database(e) if is_retryable_db_error(e))
    }

    /// `CreateAsset` failed because the key already exists
    pub fn is_already_exists(&self) -> bool {
        matches!(self, AnchorError::Contract(ContractError::AlreadyExists(_)))
    }
}

/// Result type for anchoring operations
pub type Result<T> = std::result::Result<T, AnchorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let mvcc = AnchorError::Validation {
            tx_id: "tx".into(),
            source: ValidationError::MvccReadConflict { key: "G1".into() },
        };
        assert!(mvcc.is_rejected_before_commit());
        assert!(!mvcc.is_commit_status_unknown());

        let unknown = AnchorError::CommitStatusUnknown { tx_id: "tx".into() };
        assert!(unknown.is_commit_status_unknown());
        assert!(!unknown.is_rejected_before_commit());

        let exists = AnchorError::from(ContractError::AlreadyExists("G1".into()));
        assert!(exists.is_already_exists());
        assert!(!exists.is_rejected_before_commit());

        let busy = AnchorError::Database(sqlx::Error::PoolTimedOut);
        assert!(busy.is_transient_store_error());
        assert!(!AnchorError::Database(sqlx::Error::RowNotFound).is_transient_store_error());
        assert!(!AnchorError::BatchNotFound("G1".into()).is_transient_store_error());
    }
}
