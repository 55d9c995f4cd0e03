//! Ledger gateway
//!
//! Submits and evaluates asset-contract transactions against the in-process
//! ledger platform. Submission follows the endorse / validate / commit flow:
//! the contract is simulated against a snapshot, then the read-write set is
//! validated and committed as one block.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::crypto::{sha256, DOMAIN_TX_ID};
use crate::domain::{hash_to_hex, Asset};
use crate::infra::{AnchorError, LedgerGateway, Result};
use crate::ledger::{functions, AssetContract, CommitRecord, ContractError, WorldState};

/// Gateway to an in-process ledger
#[derive(Clone)]
pub struct InProcessGateway {
    world: Arc<WorldState>,
    contract: AssetContract,
}

impl InProcessGateway {
    pub fn new(world: Arc<WorldState>) -> Self {
        Self {
            world,
            contract: AssetContract::new(),
        }
    }

    /// Gateway over a fresh, empty ledger
    pub fn ephemeral() -> Self {
        Self::new(Arc::new(WorldState::new()))
    }

    pub fn world(&self) -> &Arc<WorldState> {
        &self.world
    }

    /// Fresh transaction id: SHA-256 over a domain tag and a random nonce
    fn next_tx_id() -> String {
        let mut preimage = DOMAIN_TX_ID.to_vec();
        preimage.extend_from_slice(Uuid::new_v4().as_bytes());
        hash_to_hex(&sha256(&preimage))
    }

    /// Simulate, validate and commit one contract call
    #[instrument(skip(self, args))]
    pub fn submit(&self, function: &str, args: &[String]) -> Result<(Vec<u8>, CommitRecord)> {
        let tx_id = Self::next_tx_id();
        let tx_timestamp = Utc::now().timestamp();

        let mut sim = self.world.simulate(tx_id.clone(), tx_timestamp);
        let payload = self.contract.invoke(&mut sim, function, args).map_err(|e| {
            debug!(tx_id = %tx_id, error = %e, "Endorsement failed");
            AnchorError::Contract(e)
        })?;

        let record = self
            .world
            .commit(&tx_id, tx_timestamp, sim.into_read_write_set())
            .map_err(|source| {
                warn!(tx_id = %tx_id, error = %source, "Transaction invalidated at commit");
                AnchorError::Validation {
                    tx_id: tx_id.clone(),
                    source,
                }
            })?;

        info!(
            tx_id = %record.tx_id,
            block_num = record.block_num,
            function,
            "Transaction committed"
        );
        Ok((payload, record))
    }

    /// Run a query against the current snapshot. Nothing is committed.
    pub fn evaluate(&self, function: &str, args: &[String]) -> Result<Vec<u8>> {
        let mut sim = self
            .world
            .simulate(Self::next_tx_id(), Utc::now().timestamp());
        Ok(self.contract.invoke(&mut sim, function, args)?)
    }
}

#[async_trait]
impl LedgerGateway for InProcessGateway {
    async fn init_ledger(&self) -> Result<CommitRecord> {
        let (_, record) = self.submit(functions::INIT_LEDGER, &[])?;
        Ok(record)
    }

    async fn submit_create_asset(
        &self,
        global_root_id: &str,
        local_chain_id: &str,
        merkle_tree_root: &str,
    ) -> Result<CommitRecord> {
        let args = [
            global_root_id.to_string(),
            local_chain_id.to_string(),
            merkle_tree_root.to_string(),
        ];
        let (_, record) = self.submit(functions::CREATE_ASSET, &args)?;
        Ok(record)
    }

    async fn read_asset(&self, global_root_id: &str) -> Result<Option<Asset>> {
        match self.evaluate(functions::READ_ASSET, &[global_root_id.to_string()]) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(AnchorError::Contract(ContractError::NotFound(_))) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn asset_exists(&self, global_root_id: &str) -> Result<bool> {
        let bytes = self.evaluate(functions::ASSET_EXISTS, &[global_root_id.to_string()])?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_all_assets(&self) -> Result<Vec<Asset>> {
        let bytes = self.evaluate(functions::GET_ALL_ASSETS, &[])?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn commit_record(&self, global_root_id: &str) -> Result<Option<CommitRecord>> {
        Ok(self.world.history_for_key(global_root_id).into_iter().next())
    }
}
