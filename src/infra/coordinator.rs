//! Anchoring coordinator
//!
//! Drives a batch of confirmed certificates from the local store onto the
//! global ledger and back:
//!
//! 1. Collect confirmed, unbatched certificates of one local chain
//! 2. Hash them into leaves ordered by certID and compute the Merkle root
//! 3. Record the batch locally, before anything is submitted
//! 4. Submit `CreateAsset`, retrying rejections that left no ledger state
//! 5. Write the ledger's commit coordinates back into the batch row
//!
//! A crash between 3 and 5 leaves the batch pending; [`AnchorCoordinator::reconcile`]
//! finishes it from the ledger's own record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::crypto::{certificate_leaf_hash, compute_merkle_root, sort_leaves};
use crate::domain::{
    hash_to_hex, GlobalAnchorBatch, GlobalChainProof, Hash256, LocalCertificate, LocalChainProof,
    NewCertificate,
};
use crate::ledger::CommitRecord;

use super::{AnchorError, LedgerGateway, LocalStore, Result, Retry, RetryConfig};

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Maximum certificates per batch
    pub max_batch_size: u32,
    /// Minimum certificates before a batch is built
    pub min_batch_size: u32,
    /// Backoff for ledger submissions
    pub retry: RetryConfig,
    /// Backoff for writing commit coordinates back to the local store
    pub store_retry: RetryConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 256,
            min_batch_size: 1,
            retry: RetryConfig::ledger(),
            store_retry: RetryConfig::database(),
        }
    }
}

impl CoordinatorConfig {
    /// Load from `ANCHOR_MAX_BATCH_SIZE` / `ANCHOR_MIN_BATCH_SIZE`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_batch_size = std::env::var("ANCHOR_MAX_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_batch_size);

        let min_batch_size = std::env::var("ANCHOR_MIN_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.min_batch_size)
            .clamp(1, max_batch_size);

        Self {
            max_batch_size,
            min_batch_size,
            retry: defaults.retry,
            store_retry: defaults.store_retry,
        }
    }
}

/// A batch that made it onto the ledger and back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorReceipt {
    #[serde(rename = "globalRootID")]
    pub global_root_id: String,
    #[serde(rename = "localChainID")]
    pub local_chain_id: String,
    pub merkle_tree_root: String,
    pub cert_count: usize,
    #[serde(flatten)]
    pub proof: GlobalChainProof,
}

impl AnchorReceipt {
    fn new(batch: &GlobalAnchorBatch, proof: GlobalChainProof) -> Self {
        Self {
            global_root_id: batch.global_root_id.clone(),
            local_chain_id: batch.local_chain_id.clone(),
            merkle_tree_root: batch.merkle_tree_root.clone(),
            cert_count: batch.cert_id_list.len(),
            proof,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileFailure {
    #[serde(rename = "globalRootID")]
    pub global_root_id: String,
    pub error: String,
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Batches lacking write-back when the pass started
    pub examined: usize,
    /// Found on the ledger; write-back completed
    pub completed: usize,
    /// Not on the ledger; submitted again
    pub resubmitted: usize,
    pub failed: Vec<ReconcileFailure>,
}

/// Work waiting for the coordinator
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingWork {
    /// Local chains with confirmed certificates not yet batched
    pub local_chains: Vec<String>,
    /// Batches recorded locally but not yet written back
    pub pending_write_back: Vec<GlobalAnchorBatch>,
}

/// Leaves for a set of confirmed certificates, ordered by certID
pub fn sorted_batch_leaves(certs: &[LocalCertificate]) -> Result<Vec<(String, Hash256)>> {
    let leaves = certs
        .iter()
        .map(|cert| {
            let proof: &LocalChainProof = cert
                .local_chain
                .as_ref()
                .ok_or_else(|| AnchorError::NotLocallyCommitted(cert.cert_id.clone()))?;
            Ok((cert.cert_id.clone(), certificate_leaf_hash(cert, proof)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(sort_leaves(leaves))
}

/// Anchoring coordinator
pub struct AnchorCoordinator<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
    config: CoordinatorConfig,
    retry: Retry,
    store_retry: Retry,
    chain_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S, G> AnchorCoordinator<S, G>
where
    S: LocalStore,
    G: LedgerGateway,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>, config: CoordinatorConfig) -> Self {
        let retry = Retry::new(config.retry.clone());
        let store_retry = Retry::new(config.store_retry.clone());
        Self {
            store,
            gateway,
            config,
            retry,
            store_retry,
            chain_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn chain_lock(&self, local_chain_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .chain_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(local_chain_id.to_string()).or_default())
    }

    /// Record a newly issued certificate
    #[instrument(skip(self, cert), fields(cert_id = %cert.cert_id))]
    pub async fn issue_certificate(&self, cert: &NewCertificate) -> Result<LocalCertificate> {
        let cert = self.store.insert_certificate(cert).await?;
        info!("Certificate issued");
        Ok(cert)
    }

    /// Record the local-chain coordinates of a certificate's issuance
    #[instrument(skip(self, proof), fields(local_chain_id = %proof.local_chain_id))]
    pub async fn confirm_local_commit(
        &self,
        cert_id: &str,
        proof: &LocalChainProof,
    ) -> Result<LocalCertificate> {
        self.store.record_local_chain_proof(cert_id, proof).await
    }

    /// Build and record the next batch for a local chain.
    ///
    /// `None` when fewer than `min_batch_size` certificates are waiting.
    /// Callers must hold the chain lock.
    async fn build_batch_locked(&self, local_chain_id: &str) -> Result<Option<GlobalAnchorBatch>> {
        let certs = self
            .store
            .list_unbatched_confirmed(local_chain_id, self.config.max_batch_size)
            .await?;

        if certs.is_empty() || certs.len() < self.config.min_batch_size as usize {
            debug!(
                local_chain_id,
                pending = certs.len(),
                min_size = self.config.min_batch_size,
                "Not enough certificates for a batch"
            );
            return Ok(None);
        }

        let leaves = sorted_batch_leaves(&certs)?;
        let hashes: Vec<Hash256> = leaves.iter().map(|(_, h)| *h).collect();
        let root = compute_merkle_root(&hashes)
            .ok_or_else(|| AnchorError::EmptyBatch(local_chain_id.to_string()))?;

        let batch = GlobalAnchorBatch::new(
            Uuid::new_v4().to_string(),
            local_chain_id,
            hash_to_hex(&root),
            leaves.into_iter().map(|(id, _)| id).collect(),
        );
        self.store.insert_batch(&batch).await?;

        info!(
            global_root_id = %batch.global_root_id,
            local_chain_id,
            cert_count = batch.cert_id_list.len(),
            merkle_tree_root = %batch.merkle_tree_root,
            "Batch built"
        );
        Ok(Some(batch))
    }

    /// Build and record the next batch for a local chain, without submitting it
    pub async fn build_batch(&self, local_chain_id: &str) -> Result<Option<GlobalAnchorBatch>> {
        let lock = self.chain_lock(local_chain_id);
        let _guard = lock.lock().await;
        self.build_batch_locked(local_chain_id).await
    }

    /// Build the next batch for a local chain and anchor it
    #[instrument(skip(self))]
    pub async fn anchor_chain(&self, local_chain_id: &str) -> Result<Option<AnchorReceipt>> {
        let lock = self.chain_lock(local_chain_id);
        let _guard = lock.lock().await;

        let Some(batch) = self.build_batch_locked(local_chain_id).await? else {
            return Ok(None);
        };
        let proof = self.anchor_batch(&batch).await?;
        Ok(Some(AnchorReceipt::new(&batch, proof)))
    }

    /// Anchor every local chain with pending certificates.
    ///
    /// A failing chain is logged and skipped; its batch stays pending.
    pub async fn anchor_pending(&self) -> Result<Vec<AnchorReceipt>> {
        let chains = self.store.list_chains_with_unbatched().await?;
        let mut receipts = Vec::new();

        for local_chain_id in chains {
            match self.anchor_chain(&local_chain_id).await {
                Ok(Some(receipt)) => receipts.push(receipt),
                Ok(None) => {}
                Err(e) => {
                    warn!(local_chain_id = %local_chain_id, error = %e, "Failed to anchor chain");
                }
            }
        }

        Ok(receipts)
    }

    /// Submit a recorded batch and write the commit coordinates back
    #[instrument(skip(self, batch), fields(global_root_id = %batch.global_root_id))]
    pub async fn anchor_batch(&self, batch: &GlobalAnchorBatch) -> Result<GlobalChainProof> {
        if let Some(proof) = &batch.global_chain {
            return Ok(proof.clone());
        }

        let outcome = self
            .retry
            .run_with_predicate(
                || self.submit_once(batch),
                |e| e.is_rejected_before_commit() || e.is_commit_status_unknown(),
            )
            .await;
        let attempts = outcome.attempts;
        let record = outcome.into_result().map_err(|e| {
            error!(attempts, error = %e, "Ledger submission failed; batch left pending");
            e
        })?;

        let proof = record.to_global_chain_proof();
        self.write_back(&batch.global_root_id, &proof).await?;

        info!(
            attempts,
            tx_hash = %proof.tx_hash,
            block_num = proof.block_num,
            "Batch anchored"
        );
        Ok(proof)
    }

    /// Record the ledger coordinates, retrying transient store failures.
    ///
    /// Runs after the ledger commit; rewriting the same proof is a no-op.
    async fn write_back(&self, global_root_id: &str, proof: &GlobalChainProof) -> Result<()> {
        let outcome = self
            .store_retry
            .run_with_predicate(
                || self.store.record_global_chain_proof(global_root_id, proof),
                AnchorError::is_transient_store_error,
            )
            .await;
        let attempts = outcome.attempts;
        outcome.into_result().map_err(|e| {
            error!(attempts, error = %e, "Write-back failed; batch left for reconcile");
            e
        })?;
        Ok(())
    }

    async fn submit_once(&self, batch: &GlobalAnchorBatch) -> Result<CommitRecord> {
        match self
            .gateway
            .submit_create_asset(
                &batch.global_root_id,
                &batch.local_chain_id,
                &batch.merkle_tree_root,
            )
            .await
        {
            Ok(record) => Ok(record),
            Err(e) if e.is_already_exists() => {
                debug!("Asset already on ledger, checking root");
                self.existing_commit(batch).await
            }
            Err(e) if e.is_commit_status_unknown() => {
                warn!(error = %e, "Commit status unknown, reading back");
                if self.gateway.asset_exists(&batch.global_root_id).await? {
                    self.existing_commit(batch).await
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Commit record of an asset already on the ledger, provided it carries
    /// this batch's root
    async fn existing_commit(&self, batch: &GlobalAnchorBatch) -> Result<CommitRecord> {
        let asset = self
            .gateway
            .read_asset(&batch.global_root_id)
            .await?
            .ok_or_else(|| {
                AnchorError::Internal(format!(
                    "asset {} reported but not readable",
                    batch.global_root_id
                ))
            })?;

        if !asset.has_root(&batch.merkle_tree_root) {
            error!(
                ledger_root = %asset.merkle_tree_root,
                local_root = %batch.merkle_tree_root,
                "Conflicting anchor on ledger"
            );
            return Err(AnchorError::ConflictingAnchor {
                global_root_id: batch.global_root_id.clone(),
                ledger_root: asset.merkle_tree_root,
                local_root: batch.merkle_tree_root.clone(),
            });
        }

        self.gateway
            .commit_record(&batch.global_root_id)
            .await?
            .ok_or_else(|| {
                AnchorError::Internal(format!(
                    "no commit record for asset {}",
                    batch.global_root_id
                ))
            })
    }

    /// Finish every batch that was recorded but never written back.
    ///
    /// Batches whose asset is on the ledger take their coordinates from the
    /// ledger's commit record; batches whose asset is absent are submitted.
    /// Safe to run any number of times.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let pending = self.store.list_pending_write_back().await?;
        let mut report = ReconcileReport {
            examined: pending.len(),
            ..Default::default()
        };

        for batch in pending {
            let lock = self.chain_lock(&batch.local_chain_id);
            let _guard = lock.lock().await;

            match self.reconcile_batch(&batch).await {
                Ok(true) => report.completed += 1,
                Ok(false) => report.resubmitted += 1,
                Err(e) => {
                    warn!(
                        global_root_id = %batch.global_root_id,
                        error = %e,
                        "Reconciliation failed"
                    );
                    report.failed.push(ReconcileFailure {
                        global_root_id: batch.global_root_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            examined = report.examined,
            completed = report.completed,
            resubmitted = report.resubmitted,
            failed = report.failed.len(),
            "Reconciliation pass finished"
        );
        Ok(report)
    }

    /// `Ok(true)` if completed from the ledger, `Ok(false)` if resubmitted
    async fn reconcile_batch(&self, batch: &GlobalAnchorBatch) -> Result<bool> {
        // Another pass may have finished it since the listing
        if let Some(current) = self.store.get_batch(&batch.global_root_id).await? {
            if current.is_written_back() {
                return Ok(true);
            }
        }

        if self.gateway.asset_exists(&batch.global_root_id).await? {
            let record = self.existing_commit(batch).await?;
            self.write_back(&batch.global_root_id, &record.to_global_chain_proof()).await?;
            Ok(true)
        } else {
            self.anchor_batch(batch).await?;
            Ok(false)
        }
    }

    /// Chains with unbatched certificates and batches awaiting write-back
    pub async fn pending(&self) -> Result<PendingWork> {
        Ok(PendingWork {
            local_chains: self.store.list_chains_with_unbatched().await?,
            pending_write_back: self.store.list_pending_write_back().await?,
        })
    }
}
