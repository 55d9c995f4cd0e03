//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use cert_anchor::anchor::InProcessGateway;
use cert_anchor::domain::{Asset, LocalCertificate, LocalChainProof, NewCertificate};
use cert_anchor::infra::{
    AnchorCoordinator, AnchorError, CoordinatorConfig, LedgerGateway, Result, RetryConfig,
    SqliteLocalStore,
};
use cert_anchor::ledger::{CommitRecord, ValidationError};

/// Coordinator config with near-zero backoff
pub fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        retry: RetryConfig::fast()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
            .with_jitter(0.0),
        ..Default::default()
    }
}

/// A freshly issued certificate
pub fn new_cert(cert_id: &str) -> NewCertificate {
    NewCertificate {
        cert_id: cert_id.to_string(),
        person_id: format!("person-{cert_id}"),
        name: "Test Person".to_string(),
        brand: "BrandX".to_string(),
        num_of_dose: 2,
        issue_time: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        issuer: "clinic-1".to_string(),
        remark: String::new(),
    }
}

/// Local-chain coordinates for a certificate
pub fn local_proof(local_chain_id: &str, block_num: i64) -> LocalChainProof {
    LocalChainProof {
        local_chain_id: local_chain_id.to_string(),
        local_chain_tx_hash: format!("0x{:064x}", block_num),
        local_chain_block_num: block_num,
        local_chain_timestamp: 1_709_285_400 + block_num,
    }
}

pub type TestCoordinator<G> = AnchorCoordinator<SqliteLocalStore, G>;

/// In-memory store and fresh ledger
pub async fn test_stack() -> (Arc<SqliteLocalStore>, Arc<InProcessGateway>) {
    let store = Arc::new(SqliteLocalStore::in_memory().await.unwrap());
    let gateway = Arc::new(InProcessGateway::ephemeral());
    (store, gateway)
}

/// Issue and confirm certificates on one local chain
pub async fn issue_confirmed<G: LedgerGateway>(
    coordinator: &TestCoordinator<G>,
    local_chain_id: &str,
    cert_ids: &[&str],
) -> Vec<LocalCertificate> {
    let mut confirmed = Vec::new();
    for (i, cert_id) in cert_ids.iter().enumerate() {
        coordinator.issue_certificate(&new_cert(cert_id)).await.unwrap();
        let cert = coordinator
            .confirm_local_commit(cert_id, &local_proof(local_chain_id, 100 + i as i64))
            .await
            .unwrap();
        confirmed.push(cert);
    }
    confirmed
}

/// Gateway wrapper that injects submission faults in front of a real ledger
pub struct FaultyGateway {
    inner: Arc<InProcessGateway>,
    /// Submissions to reject as MVCC losers before touching the ledger
    reject_before_commit: AtomicUsize,
    /// Submissions to commit but report as status unknown
    lose_reply_after_commit: AtomicUsize,
    pub submissions: AtomicUsize,
}

impl FaultyGateway {
    pub fn new(inner: Arc<InProcessGateway>) -> Self {
        Self {
            inner,
            reject_before_commit: AtomicUsize::new(0),
            lose_reply_after_commit: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
        }
    }

    pub fn reject_next(self, n: usize) -> Self {
        self.reject_before_commit.store(n, Ordering::SeqCst);
        self
    }

    pub fn lose_next_reply(self, n: usize) -> Self {
        self.lose_reply_after_commit.store(n, Ordering::SeqCst);
        self
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LedgerGateway for FaultyGateway {
    async fn init_ledger(&self) -> Result<CommitRecord> {
        self.inner.init_ledger().await
    }

    async fn submit_create_asset(
        &self,
        global_root_id: &str,
        local_chain_id: &str,
        merkle_tree_root: &str,
    ) -> Result<CommitRecord> {
        self.submissions.fetch_add(1, Ordering::SeqCst);

        if Self::take(&self.reject_before_commit) {
            return Err(AnchorError::Validation {
                tx_id: "injected".to_string(),
                source: ValidationError::MvccReadConflict {
                    key: global_root_id.to_string(),
                },
            });
        }

        let record = self
            .inner
            .submit_create_asset(global_root_id, local_chain_id, merkle_tree_root)
            .await?;

        if Self::take(&self.lose_reply_after_commit) {
            return Err(AnchorError::CommitStatusUnknown {
                tx_id: record.tx_id,
            });
        }
        Ok(record)
    }

    async fn read_asset(&self, global_root_id: &str) -> Result<Option<Asset>> {
        self.inner.read_asset(global_root_id).await
    }

    async fn asset_exists(&self, global_root_id: &str) -> Result<bool> {
        self.inner.asset_exists(global_root_id).await
    }

    async fn get_all_assets(&self) -> Result<Vec<Asset>> {
        self.inner.get_all_assets().await
    }

    async fn commit_record(&self, global_root_id: &str) -> Result<Option<CommitRecord>> {
        self.inner.commit_record(global_root_id).await
    }
}
