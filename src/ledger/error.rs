//! Errors raised by contract execution and ledger validation

use thiserror::Error;

/// Errors returned by the asset contract.
///
/// Any of these fails the invocation; a failed simulation is never committed.
#[derive(Error, Debug)]
pub enum ContractError {
    /// Create on a key that is already present
    #[error("the asset {0} already exists")]
    AlreadyExists(String),

    /// Read of a missing key
    #[error("the asset {0} does not exist")]
    NotFound(String),

    /// Stored bytes do not parse as an asset
    #[error("failed to decode asset {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Asset could not be serialized
    #[error("failed to encode asset {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// World state read or write failed
    #[error("world state error: {0}")]
    Storage(String),

    /// Missing or malformed argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Function name not exposed by the contract
    #[error("unknown contract function: {0}")]
    UnknownFunction(String),
}

/// Reasons the ledger rejects a simulated transaction at commit time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A key read during simulation changed before this transaction committed
    #[error("MVCC read conflict on key {key}")]
    MvccReadConflict { key: String },

    /// The transaction id was already committed
    #[error("duplicate transaction id {0}")]
    DuplicateTxId(String),
}
