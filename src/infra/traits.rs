//! Trait definitions for the anchoring services

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::{
    Asset, GlobalAnchorBatch, GlobalChainProof, LocalCertificate, LocalChainProof, NewCertificate,
};
use crate::ledger::CommitRecord;

use super::Result;

/// Durable record of issued certificates and anchor batches.
///
/// Invariant: a certificate's local-chain proof and a batch's global-chain
/// proof are each written at most once.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Insert a newly issued certificate with no local-chain proof
    async fn insert_certificate(&self, cert: &NewCertificate) -> Result<LocalCertificate>;

    async fn get_certificate(&self, cert_id: &str) -> Result<Option<LocalCertificate>>;

    /// Fetch certificates by id, ordered by certID. Missing ids are skipped.
    async fn get_certificates(&self, cert_ids: &[String]) -> Result<Vec<LocalCertificate>>;

    /// Record the local-chain coordinates of a certificate's issuance
    ///
    /// Re-recording identical coordinates is a no-op; different coordinates
    /// fail with `AlreadyConfirmed`.
    async fn record_local_chain_proof(
        &self,
        cert_id: &str,
        proof: &LocalChainProof,
    ) -> Result<LocalCertificate>;

    /// Confirmed certificates of one local chain not yet in any batch, by certID
    async fn list_unbatched_confirmed(
        &self,
        local_chain_id: &str,
        limit: u32,
    ) -> Result<Vec<LocalCertificate>>;

    /// Local chains with at least one confirmed, unbatched certificate
    async fn list_chains_with_unbatched(&self) -> Result<Vec<String>>;

    /// Record a batch and its memberships atomically
    ///
    /// Fails if any member is unknown, unconfirmed, on another local chain,
    /// or already batched.
    async fn insert_batch(&self, batch: &GlobalAnchorBatch) -> Result<()>;

    async fn get_batch(&self, global_root_id: &str) -> Result<Option<GlobalAnchorBatch>>;

    /// Batch a certificate belongs to, if any
    async fn find_batch_for_certificate(&self, cert_id: &str)
        -> Result<Option<GlobalAnchorBatch>>;

    /// Batches still missing their global-chain proof, oldest first
    async fn list_pending_write_back(&self) -> Result<Vec<GlobalAnchorBatch>>;

    /// Write the global-chain proof back into a batch row
    ///
    /// Re-recording identical coordinates is a no-op; different coordinates
    /// fail with `AlreadyWrittenBack`.
    async fn record_global_chain_proof(
        &self,
        global_root_id: &str,
        proof: &GlobalChainProof,
    ) -> Result<GlobalAnchorBatch>;
}

/// Client-side view of the global anchor ledger.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Submit `InitLedger`
    async fn init_ledger(&self) -> Result<CommitRecord>;

    /// Submit `CreateAsset` and wait for its commit
    async fn submit_create_asset(
        &self,
        global_root_id: &str,
        local_chain_id: &str,
        merkle_tree_root: &str,
    ) -> Result<CommitRecord>;

    /// Evaluate `ReadAsset`. `None` if the asset does not exist.
    async fn read_asset(&self, global_root_id: &str) -> Result<Option<Asset>>;

    /// Evaluate `AssetExists`
    async fn asset_exists(&self, global_root_id: &str) -> Result<bool>;

    /// Evaluate `GetAllAssets`
    async fn get_all_assets(&self) -> Result<Vec<Asset>>;

    /// Commit record of the transaction that created `global_root_id`
    async fn commit_record(&self, global_root_id: &str) -> Result<Option<CommitRecord>>;
}
