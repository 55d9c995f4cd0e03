//! Transaction-context capability
//!
//! The ledger runtime hands every contract invocation a context bound to one
//! transaction. Reads see a point-in-time snapshot, writes are buffered until
//! the transaction is validated and committed.

use super::ContractError;

/// A key-value pair returned by a range scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

/// Capability the ledger platform provides to contract code.
///
/// `tx_timestamp` is the proposal timestamp carried in the transaction
/// header; every endorsing node sees the same value for the same
/// transaction, unlike the node's own clock.
pub trait TransactionContext {
    /// Range scan handle. Dropping it releases the underlying scan.
    type Scan: Iterator<Item = Result<KeyValue, ContractError>>;

    /// Identifier of the transaction being simulated
    fn tx_id(&self) -> &str;

    /// Proposal timestamp in unix seconds
    fn tx_timestamp(&self) -> i64;

    /// Read a key. `None` if the key is absent.
    fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, ContractError>;

    /// Buffer a write for commit
    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), ContractError>;

    /// Scan keys in `[start_key, end_key)`. Empty bounds are open-ended.
    fn get_state_by_range(
        &mut self,
        start_key: &str,
        end_key: &str,
    ) -> Result<Self::Scan, ContractError>;
}
