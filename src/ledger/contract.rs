//! Asset contract
//!
//! Deterministic state transitions over `Asset` records. The contract holds
//! no state of its own; everything goes through the [`TransactionContext`].

use tracing::{debug, instrument};

use crate::domain::Asset;

use super::{ContractError, KeyValue, TransactionContext};

/// Sentinel asset written by `InitLedger`
pub const SENTINEL_GLOBAL_ROOT_ID: &str = "testID";
pub const SENTINEL_LOCAL_CHAIN_ID: &str = "testLocalChainID";
pub const SENTINEL_MERKLE_TREE_ROOT: &str = "merkletreeroot test";
pub const SENTINEL_TX_HASH: &str = "testGlobalChainTxHash";

/// Contract function names, as submitted by clients
pub mod functions {
    pub const INIT_LEDGER: &str = "InitLedger";
    pub const CREATE_ASSET: &str = "CreateAsset";
    pub const READ_ASSET: &str = "ReadAsset";
    pub const ASSET_EXISTS: &str = "AssetExists";
    pub const GET_ALL_ASSETS: &str = "GetAllAssets";
}

/// The asset contract
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetContract;

impl AssetContract {
    pub fn new() -> Self {
        Self
    }

    /// Seed the sentinel asset
    #[instrument(skip(self, ctx), fields(tx_id = ctx.tx_id()))]
    pub fn init_ledger<C: TransactionContext>(&self, ctx: &mut C) -> Result<(), ContractError> {
        let asset = Asset {
            global_root_id: SENTINEL_GLOBAL_ROOT_ID.to_string(),
            local_chain_id: SENTINEL_LOCAL_CHAIN_ID.to_string(),
            merkle_tree_root: SENTINEL_MERKLE_TREE_ROOT.to_string(),
            global_chain_tx_hash: SENTINEL_TX_HASH.to_string(),
            global_chain_block_num: crate::domain::PLACEHOLDER_BLOCK_NUM,
            global_chain_timestamp: ctx.tx_timestamp(),
        };
        put_asset(ctx, &asset)
    }

    /// Create a new asset. Fails if `global_root_id` is already present.
    #[instrument(skip(self, ctx), fields(tx_id = ctx.tx_id()))]
    pub fn create_asset<C: TransactionContext>(
        &self,
        ctx: &mut C,
        global_root_id: &str,
        local_chain_id: &str,
        merkle_tree_root: &str,
    ) -> Result<Asset, ContractError> {
        require_non_empty("globalRootID", global_root_id)?;
        require_non_empty("localChainID", local_chain_id)?;
        require_non_empty("merkleTreeRoot", merkle_tree_root)?;

        // Recorded in the read set: a concurrent create of the same key
        // invalidates whichever transaction commits second.
        if self.asset_exists(ctx, global_root_id)? {
            return Err(ContractError::AlreadyExists(global_root_id.to_string()));
        }

        let asset = Asset::unanchored(
            global_root_id,
            local_chain_id,
            merkle_tree_root,
            ctx.tx_timestamp(),
        );
        put_asset(ctx, &asset)?;

        debug!(global_root_id, local_chain_id, "Asset staged");
        Ok(asset)
    }

    pub fn read_asset<C: TransactionContext>(
        &self,
        ctx: &mut C,
        global_root_id: &str,
    ) -> Result<Asset, ContractError> {
        let bytes = ctx
            .get_state(global_root_id)?
            .ok_or_else(|| ContractError::NotFound(global_root_id.to_string()))?;
        decode_asset(global_root_id, &bytes)
    }

    pub fn asset_exists<C: TransactionContext>(
        &self,
        ctx: &mut C,
        global_root_id: &str,
    ) -> Result<bool, ContractError> {
        Ok(ctx.get_state(global_root_id)?.is_some())
    }

    /// Every asset in key order, decoded lazily
    pub fn get_all_assets<C: TransactionContext>(
        &self,
        ctx: &mut C,
    ) -> Result<AssetIter<C::Scan>, ContractError> {
        let scan = ctx.get_state_by_range("", "")?;
        Ok(AssetIter { scan: Some(scan) })
    }

    /// Dispatch a contract call by function name.
    ///
    /// Returns the JSON payload of the result; empty for `InitLedger`.
    pub fn invoke<C: TransactionContext>(
        &self,
        ctx: &mut C,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, ContractError> {
        match function {
            functions::INIT_LEDGER => {
                expect_args(function, args, 0)?;
                self.init_ledger(ctx)?;
                Ok(Vec::new())
            }
            functions::CREATE_ASSET => {
                expect_args(function, args, 3)?;
                let asset = self.create_asset(ctx, &args[0], &args[1], &args[2])?;
                encode(&asset.global_root_id, &asset)
            }
            functions::READ_ASSET => {
                expect_args(function, args, 1)?;
                let asset = self.read_asset(ctx, &args[0])?;
                encode(&args[0], &asset)
            }
            functions::ASSET_EXISTS => {
                expect_args(function, args, 1)?;
                let exists = self.asset_exists(ctx, &args[0])?;
                encode(&args[0], &exists)
            }
            functions::GET_ALL_ASSETS => {
                expect_args(function, args, 0)?;
                let assets = self
                    .get_all_assets(ctx)?
                    .collect::<Result<Vec<_>, _>>()?;
                encode("*", &assets)
            }
            other => Err(ContractError::UnknownFunction(other.to_string())),
        }
    }
}

/// Lazy decoder over a range scan.
///
/// The scan is dropped as soon as it ends or yields an error, so the
/// platform's scan slot is released on every path, including when the
/// caller stops early and drops the iterator.
pub struct AssetIter<S> {
    scan: Option<S>,
}

impl<S> Iterator for AssetIter<S>
where
    S: Iterator<Item = Result<KeyValue, ContractError>>,
{
    type Item = Result<Asset, ContractError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.scan.as_mut()?.next();
        let result = match item {
            Some(Ok(kv)) => decode_asset(&kv.key, &kv.value),
            Some(Err(e)) => Err(e),
            None => {
                self.scan = None;
                return None;
            }
        };

        if result.is_err() {
            self.scan = None;
        }
        Some(result)
    }
}

fn put_asset<C: TransactionContext>(ctx: &mut C, asset: &Asset) -> Result<(), ContractError> {
    let bytes = serde_json::to_vec(asset).map_err(|source| ContractError::Encode {
        key: asset.global_root_id.clone(),
        source,
    })?;
    ctx.put_state(&asset.global_root_id, bytes)
}

fn decode_asset(key: &str, bytes: &[u8]) -> Result<Asset, ContractError> {
    serde_json::from_slice(bytes).map_err(|source| ContractError::Decode {
        key: key.to_string(),
        source,
    })
}

fn encode<T: serde::Serialize>(key: &str, value: &T) -> Result<Vec<u8>, ContractError> {
    serde_json::to_vec(value).map_err(|source| ContractError::Encode {
        key: key.to_string(),
        source,
    })
}

fn require_non_empty(name: &str, value: &str) -> Result<(), ContractError> {
    if value.is_empty() {
        return Err(ContractError::InvalidArgument(format!(
            "{name} must not be empty"
        )));
    }
    Ok(())
}

fn expect_args(function: &str, args: &[String], n: usize) -> Result<(), ContractError> {
    if args.len() != n {
        return Err(ContractError::InvalidArgument(format!(
            "{function} expects {n} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ValidationError, WorldState};

    fn create(
        world: &WorldState,
        tx_id: &str,
        id: &str,
        chain: &str,
        root: &str,
    ) -> Result<Asset, ContractError> {
        let mut sim = world.simulate(tx_id, 1_700_000_000);
        let asset = AssetContract.create_asset(&mut sim, id, chain, root)?;
        world
            .commit(tx_id, 1_700_000_000, sim.into_read_write_set())
            .unwrap();
        Ok(asset)
    }

    #[test]
    fn test_create_then_read() {
        let world = WorldState::new();
        create(&world, "tx1", "G1", "L1", "deadbeef").unwrap();

        let mut sim = world.simulate("q", 0);
        let asset = AssetContract.read_asset(&mut sim, "G1").unwrap();
        assert_eq!(asset.global_root_id, "G1");
        assert_eq!(asset.local_chain_id, "L1");
        assert_eq!(asset.merkle_tree_root, "deadbeef");
        assert_eq!(asset.global_chain_tx_hash, "");
        assert_eq!(asset.global_chain_block_num, 1);
        assert_eq!(asset.global_chain_timestamp, 1_700_000_000);
    }

    #[test]
    fn test_create_existing_fails() {
        let world = WorldState::new();
        create(&world, "tx1", "G1", "L1", "deadbeef").unwrap();

        let err = create(&world, "tx2", "G1", "L1", "cafebabe").unwrap_err();
        assert!(matches!(err, ContractError::AlreadyExists(id) if id == "G1"));
    }

    #[test]
    fn test_create_requires_all_fields() {
        let world = WorldState::new();
        let mut sim = world.simulate("tx", 0);
        let err = AssetContract
            .create_asset(&mut sim, "G1", "", "root")
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidArgument(_)));
    }

    #[test]
    fn test_timestamp_comes_from_context() {
        let world = WorldState::new();
        let mut a = world.simulate("tx-a", 42);
        let mut b = world.simulate("tx-b", 42);
        let asset_a = AssetContract.create_asset(&mut a, "G1", "L1", "r").unwrap();
        let asset_b = AssetContract.create_asset(&mut b, "G1", "L1", "r").unwrap();
        assert_eq!(asset_a, asset_b);
        assert_eq!(asset_a.global_chain_timestamp, 42);
    }

    #[test]
    fn test_concurrent_create_loser_fails_validation() {
        let world = WorldState::new();
        let mut a = world.simulate("tx-a", 1);
        let mut b = world.simulate("tx-b", 1);
        AssetContract.create_asset(&mut a, "G1", "L1", "aa").unwrap();
        AssetContract.create_asset(&mut b, "G1", "L1", "bb").unwrap();

        world.commit("tx-a", 1, a.into_read_write_set()).unwrap();
        let err = world
            .commit("tx-b", 1, b.into_read_write_set())
            .unwrap_err();
        assert!(matches!(err, ValidationError::MvccReadConflict { .. }));

        let mut q = world.simulate("q", 0);
        assert_eq!(
            AssetContract.read_asset(&mut q, "G1").unwrap().merkle_tree_root,
            "aa"
        );
    }

    #[test]
    fn test_read_missing_asset() {
        let world = WorldState::new();
        let mut sim = world.simulate("q", 0);
        let err = AssetContract.read_asset(&mut sim, "nope").unwrap_err();
        assert!(matches!(err, ContractError::NotFound(id) if id == "nope"));
    }

    #[test]
    fn test_asset_exists_only_for_created_id() {
        let world = WorldState::new();
        create(&world, "tx1", "G1", "L1", "deadbeef").unwrap();

        let mut sim = world.simulate("q", 0);
        assert!(AssetContract.asset_exists(&mut sim, "G1").unwrap());
        assert!(!AssetContract.asset_exists(&mut sim, "G2").unwrap());
        assert!(!AssetContract.asset_exists(&mut sim, "g1").unwrap());
    }

    #[test]
    fn test_get_all_assets_in_key_order() {
        let world = WorldState::new();
        create(&world, "tx1", "C", "L1", "cc").unwrap();
        create(&world, "tx2", "A", "L1", "aa").unwrap();
        create(&world, "tx3", "B", "L1", "bb").unwrap();

        let mut sim = world.simulate("q", 0);
        let ids: Vec<String> = AssetContract
            .get_all_assets(&mut sim)
            .unwrap()
            .map(|a| a.unwrap().global_root_id)
            .collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(world.open_scans(), 0);
    }

    #[test]
    fn test_decode_error_releases_scan() {
        let world = WorldState::new();
        create(&world, "tx1", "A", "L1", "aa").unwrap();
        let mut sim = world.simulate("tx2", 1);
        sim.put_state("B", b"not json".to_vec()).unwrap();
        world.commit("tx2", 1, sim.into_read_write_set()).unwrap();
        create(&world, "tx3", "C", "L1", "cc").unwrap();

        let mut sim = world.simulate("q", 0);
        let mut iter = AssetContract.get_all_assets(&mut sim).unwrap();
        assert!(iter.next().unwrap().is_ok());
        assert!(matches!(
            iter.next(),
            Some(Err(ContractError::Decode { ref key, .. })) if key == "B"
        ));
        assert_eq!(world.open_scans(), 0);
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_early_drop_releases_scan() {
        let world = WorldState::new();
        create(&world, "tx1", "A", "L1", "aa").unwrap();
        create(&world, "tx2", "B", "L1", "bb").unwrap();

        let mut sim = world.simulate("q", 0);
        let mut iter = AssetContract.get_all_assets(&mut sim).unwrap();
        iter.next();
        assert_eq!(world.open_scans(), 1);
        drop(iter);
        assert_eq!(world.open_scans(), 0);
    }

    #[test]
    fn test_init_ledger_seeds_sentinel() {
        let world = WorldState::new();
        let mut sim = world.simulate("init", 7);
        AssetContract
            .invoke(&mut sim, functions::INIT_LEDGER, &[])
            .unwrap();
        world.commit("init", 7, sim.into_read_write_set()).unwrap();

        let mut q = world.simulate("q", 0);
        let asset = AssetContract.read_asset(&mut q, SENTINEL_GLOBAL_ROOT_ID).unwrap();
        assert_eq!(asset.local_chain_id, SENTINEL_LOCAL_CHAIN_ID);
        assert_eq!(asset.merkle_tree_root, SENTINEL_MERKLE_TREE_ROOT);
        assert_eq!(asset.global_chain_tx_hash, SENTINEL_TX_HASH);
        assert_eq!(asset.global_chain_block_num, 1);
        assert_eq!(asset.global_chain_timestamp, 7);
    }

    #[test]
    fn test_invoke_dispatch() {
        let world = WorldState::new();
        create(&world, "tx1", "G1", "L1", "deadbeef").unwrap();
        let mut sim = world.simulate("q", 0);

        let out = AssetContract
            .invoke(&mut sim, functions::ASSET_EXISTS, &["G1".to_string()])
            .unwrap();
        assert_eq!(out, b"true".to_vec());

        let out = AssetContract
            .invoke(&mut sim, functions::GET_ALL_ASSETS, &[])
            .unwrap();
        let assets: Vec<Asset> = serde_json::from_slice(&out).unwrap();
        assert_eq!(assets.len(), 1);

        let err = AssetContract
            .invoke(&mut sim, "DeleteAsset", &["G1".to_string()])
            .unwrap_err();
        assert!(matches!(err, ContractError::UnknownFunction(_)));

        let err = AssetContract
            .invoke(&mut sim, functions::READ_ASSET, &[])
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidArgument(_)));
    }
}
