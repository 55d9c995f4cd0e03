//! In-process ledger platform
//!
//! Versioned key-value world state with snapshot reads and
//! simulate-then-validate commits. A transaction records the version of every
//! key it read; commit rejects it if any of those versions moved in the
//! meantime, so for any key only the first committed writer wins.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::crypto::{encode_string, i64_be, DOMAIN_BLOCK};
use crate::domain::{GlobalChainProof, Hash256};

use super::{ContractError, KeyValue, TransactionContext, ValidationError};

/// Height at which a value was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub block_num: u64,
    pub tx_num: u64,
}

#[derive(Debug, Clone)]
struct VersionedValue {
    value: Vec<u8>,
    version: Version,
}

type StateMap = BTreeMap<String, VersionedValue>;

/// Where and when a transaction was committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub tx_id: String,
    pub block_num: u64,
    /// Unix seconds, taken from the transaction header
    pub timestamp: i64,
}

impl CommitRecord {
    pub fn to_global_chain_proof(&self) -> GlobalChainProof {
        GlobalChainProof {
            tx_hash: self.tx_id.clone(),
            block_num: self.block_num as i64,
            timestamp: self.timestamp,
        }
    }
}

/// Committed block. One transaction per block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub previous_hash: Hash256,
    pub hash: Hash256,
    /// `None` for the genesis block
    pub tx_id: Option<String>,
    pub timestamp: i64,
}

fn block_hash(number: u64, previous_hash: &Hash256, tx_id: &str, timestamp: i64) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_BLOCK);
    hasher.update(number.to_be_bytes());
    hasher.update(previous_hash);
    hasher.update(encode_string(tx_id));
    hasher.update(i64_be(timestamp));
    hasher.finalize().into()
}

/// Reads and buffered writes produced by simulating one transaction
#[derive(Debug, Default, Clone)]
pub struct ReadWriteSet {
    reads: BTreeMap<String, Option<Version>>,
    writes: BTreeMap<String, Vec<u8>>,
}

struct LedgerInner {
    state: Arc<StateMap>,
    blocks: Vec<Block>,
    history: HashMap<String, Vec<CommitRecord>>,
    committed_tx_ids: HashSet<String>,
}

/// Replicated world state as seen by one peer
pub struct WorldState {
    inner: RwLock<LedgerInner>,
    open_scans: Arc<AtomicUsize>,
}

impl WorldState {
    /// Create an empty ledger holding only the genesis block
    pub fn new() -> Self {
        let previous_hash = [0u8; 32];
        let genesis = Block {
            number: 0,
            previous_hash,
            hash: block_hash(0, &previous_hash, "", 0),
            tx_id: None,
            timestamp: 0,
        };

        Self {
            inner: RwLock::new(LedgerInner {
                state: Arc::new(StateMap::new()),
                blocks: vec![genesis],
                history: HashMap::new(),
                committed_tx_ids: HashSet::new(),
            }),
            open_scans: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point-in-time view. Later commits never change what it returns.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: Arc::clone(&self.read().state),
            open_scans: Arc::clone(&self.open_scans),
        }
    }

    /// Start simulating a transaction against the current snapshot
    pub fn simulate(&self, tx_id: impl Into<String>, tx_timestamp: i64) -> TxSimulator {
        TxSimulator {
            tx_id: tx_id.into(),
            timestamp: tx_timestamp,
            snapshot: self.snapshot(),
            rwset: ReadWriteSet::default(),
        }
    }

    /// Validate and commit a simulated transaction in a new block
    pub fn commit(
        &self,
        tx_id: &str,
        tx_timestamp: i64,
        rwset: ReadWriteSet,
    ) -> Result<CommitRecord, ValidationError> {
        let mut guard = self.write();
        let inner = &mut *guard;

        if inner.committed_tx_ids.contains(tx_id) {
            return Err(ValidationError::DuplicateTxId(tx_id.to_string()));
        }

        for (key, read_version) in &rwset.reads {
            let current = inner.state.get(key).map(|v| v.version);
            if current != *read_version {
                warn!(tx_id, key = %key, "MVCC read conflict, transaction invalidated");
                return Err(ValidationError::MvccReadConflict { key: key.clone() });
            }
        }

        let block_num = inner.blocks.len() as u64;
        let version = Version {
            block_num,
            tx_num: 0,
        };
        let record = CommitRecord {
            tx_id: tx_id.to_string(),
            block_num,
            timestamp: tx_timestamp,
        };

        let state = Arc::make_mut(&mut inner.state);
        for (key, value) in rwset.writes {
            inner
                .history
                .entry(key.clone())
                .or_default()
                .push(record.clone());
            state.insert(key, VersionedValue { value, version });
        }

        let previous_hash = inner
            .blocks
            .last()
            .map(|b| b.hash)
            .unwrap_or([0u8; 32]);
        inner.blocks.push(Block {
            number: block_num,
            previous_hash,
            hash: block_hash(block_num, &previous_hash, tx_id, tx_timestamp),
            tx_id: Some(tx_id.to_string()),
            timestamp: tx_timestamp,
        });
        inner.committed_tx_ids.insert(tx_id.to_string());

        debug!(tx_id, block_num, "Transaction committed");
        Ok(record)
    }

    /// Number of blocks, genesis included
    pub fn height(&self) -> u64 {
        self.read().blocks.len() as u64
    }

    pub fn block(&self, number: u64) -> Option<Block> {
        self.read().blocks.get(number as usize).cloned()
    }

    /// Commits that wrote `key`, oldest first
    pub fn history_for_key(&self, key: &str) -> Vec<CommitRecord> {
        self.read().history.get(key).cloned().unwrap_or_default()
    }

    /// Range scans currently holding a snapshot
    pub fn open_scans(&self) -> usize {
        self.open_scans.load(Ordering::SeqCst)
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable view of the world state at one height
#[derive(Clone)]
pub struct Snapshot {
    state: Arc<StateMap>,
    open_scans: Arc<AtomicUsize>,
}

impl Snapshot {
    fn get(&self, key: &str) -> Option<&VersionedValue> {
        self.state.get(key)
    }

    /// Scan `[start_key, end_key)`; empty bounds are open-ended
    pub fn range(&self, start_key: &str, end_key: &str) -> RangeScan {
        let exhausted = !start_key.is_empty() && !end_key.is_empty() && start_key >= end_key;
        let cursor = if start_key.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Included(start_key.to_string())
        };

        RangeScan {
            state: Arc::clone(&self.state),
            cursor,
            end: (!end_key.is_empty()).then(|| end_key.to_string()),
            exhausted,
            _guard: ScanGuard::acquire(&self.open_scans),
        }
    }
}

struct ScanGuard(Arc<AtomicUsize>);

impl ScanGuard {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Lazy range scan over a snapshot, in key order.
///
/// Holds its scan slot until dropped.
pub struct RangeScan {
    state: Arc<StateMap>,
    cursor: Bound<String>,
    end: Option<String>,
    exhausted: bool,
    _guard: ScanGuard,
}

impl Iterator for RangeScan {
    type Item = Result<KeyValue, ContractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let lower = match &self.cursor {
            Bound::Included(k) => Bound::Included(k.as_str()),
            Bound::Excluded(k) => Bound::Excluded(k.as_str()),
            Bound::Unbounded => Bound::Unbounded,
        };
        let upper = match &self.end {
            Some(e) => Bound::Excluded(e.as_str()),
            None => Bound::Unbounded,
        };

        let next = self
            .state
            .range::<str, _>((lower, upper))
            .next()
            .map(|(k, v)| (k.clone(), v.value.clone()));

        match next {
            Some((key, value)) => {
                self.cursor = Bound::Excluded(key.clone());
                Some(Ok(KeyValue { key, value }))
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

/// Transaction simulation bound to one snapshot
pub struct TxSimulator {
    tx_id: String,
    timestamp: i64,
    snapshot: Snapshot,
    rwset: ReadWriteSet,
}

impl TxSimulator {
    pub fn into_read_write_set(self) -> ReadWriteSet {
        self.rwset
    }
}

impl TransactionContext for TxSimulator {
    type Scan = RangeScan;

    fn tx_id(&self) -> &str {
        &self.tx_id
    }

    fn tx_timestamp(&self) -> i64 {
        self.timestamp
    }

    fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, ContractError> {
        if key.is_empty() {
            return Err(ContractError::InvalidArgument(
                "key must not be empty".to_string(),
            ));
        }

        let entry = self.snapshot.get(key);
        self.rwset
            .reads
            .entry(key.to_string())
            .or_insert(entry.map(|e| e.version));
        Ok(entry.map(|e| e.value.clone()))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), ContractError> {
        if key.is_empty() {
            return Err(ContractError::InvalidArgument(
                "key must not be empty".to_string(),
            ));
        }

        self.rwset.writes.insert(key.to_string(), value);
        Ok(())
    }

    fn get_state_by_range(
        &mut self,
        start_key: &str,
        end_key: &str,
    ) -> Result<Self::Scan, ContractError> {
        Ok(self.snapshot.range(start_key, end_key))
    }
}
