//! SQLite local certificate store
//!
//! Certificates are inserted at issuance and updated exactly once when the
//! local chain confirms them. Batches are recorded together with their
//! memberships in one transaction, before the ledger submission, and updated
//! exactly once when the global-chain proof is written back.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite};
use tracing::{debug, info};

use crate::domain::{
    GlobalAnchorBatch, GlobalChainProof, LocalCertificate, LocalChainProof, NewCertificate,
};
use crate::infra::{AnchorError, LocalStore, Result};

const CERT_COLUMNS: &str = r#"
    certID AS cert_id, personID AS person_id, name, brand,
    numOfDose AS num_of_dose, issueTime AS issue_time, issuer, remark,
    localChainID AS local_chain_id, localChainTxHash AS local_chain_tx_hash,
    localChainBlockNum AS local_chain_block_num,
    localChainTimeStamp AS local_chain_timestamp
"#;

const BATCH_COLUMNS: &str = r#"
    b.globalRootID AS global_root_id, b.localChainID AS local_chain_id,
    b.merkleTreeRoot AS merkle_tree_root, b.certIDList AS cert_id_list,
    b.createdAt AS created_at, b.globalChainTxHash AS global_chain_tx_hash,
    b.globalChainBlockNum AS global_chain_block_num,
    b.globalChainTimeStamp AS global_chain_timestamp
"#;

fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(field: &str, s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AnchorError::Internal(format!("invalid {field} timestamp {s:?}: {e}")))
}

/// SQLite-backed [`LocalStore`]
#[derive(Clone)]
pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a database URL such as `sqlite://anchor.db`, creating the
    /// file if missing.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Private in-memory database with the schema applied
    pub async fn in_memory() -> Result<Self> {
        // A single long-lived connection; every new connection to
        // `sqlite::memory:` would open a different database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Apply pending migrations
    pub async fn initialize(&self) -> Result<()> {
        crate::migrations::run_sqlite(&self.pool)
            .await
            .map_err(|e| AnchorError::Internal(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(FromRow)]
struct CertificateRow {
    cert_id: String,
    person_id: String,
    name: String,
    brand: String,
    num_of_dose: i64,
    issue_time: String,
    issuer: String,
    remark: String,
    local_chain_id: Option<String>,
    local_chain_tx_hash: Option<String>,
    local_chain_block_num: Option<i64>,
    local_chain_timestamp: Option<i64>,
}

impl TryFrom<CertificateRow> for LocalCertificate {
    type Error = AnchorError;

    fn try_from(row: CertificateRow) -> Result<Self> {
        let num_of_dose = u32::try_from(row.num_of_dose).map_err(|_| {
            AnchorError::Internal(format!(
                "invalid numOfDose {} for {}",
                row.num_of_dose, row.cert_id
            ))
        })?;

        let local_chain = match (
            row.local_chain_id,
            row.local_chain_tx_hash,
            row.local_chain_block_num,
            row.local_chain_timestamp,
        ) {
            (Some(local_chain_id), Some(local_chain_tx_hash), Some(block_num), Some(ts)) => {
                Some(LocalChainProof {
                    local_chain_id,
                    local_chain_tx_hash,
                    local_chain_block_num: block_num,
                    local_chain_timestamp: ts,
                })
            }
            _ => None,
        };

        Ok(LocalCertificate {
            issue_time: parse_time("issueTime", &row.issue_time)?,
            cert_id: row.cert_id,
            person_id: row.person_id,
            name: row.name,
            brand: row.brand,
            num_of_dose,
            issuer: row.issuer,
            remark: row.remark,
            local_chain,
        })
    }
}

#[derive(FromRow)]
struct BatchRow {
    global_root_id: String,
    local_chain_id: String,
    merkle_tree_root: String,
    cert_id_list: String,
    created_at: String,
    global_chain_tx_hash: Option<String>,
    global_chain_block_num: Option<i64>,
    global_chain_timestamp: Option<i64>,
}

impl TryFrom<BatchRow> for GlobalAnchorBatch {
    type Error = AnchorError;

    fn try_from(row: BatchRow) -> Result<Self> {
        let global_chain = match (
            row.global_chain_tx_hash,
            row.global_chain_block_num,
            row.global_chain_timestamp,
        ) {
            (Some(tx_hash), Some(block_num), Some(timestamp)) => Some(GlobalChainProof {
                tx_hash,
                block_num,
                timestamp,
            }),
            _ => None,
        };

        Ok(GlobalAnchorBatch {
            cert_id_list: serde_json::from_str(&row.cert_id_list)?,
            created_at: parse_time("createdAt", &row.created_at)?,
            global_root_id: row.global_root_id,
            local_chain_id: row.local_chain_id,
            merkle_tree_root: row.merkle_tree_root,
            global_chain,
        })
    }
}

async fn fetch_certificate<'e, E>(executor: E, cert_id: &str) -> Result<Option<LocalCertificate>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {CERT_COLUMNS} FROM localCertificate WHERE certID = ?");
    let row = sqlx::query_as::<_, CertificateRow>(&sql)
        .bind(cert_id)
        .fetch_optional(executor)
        .await?;
    row.map(LocalCertificate::try_from).transpose()
}

async fn fetch_batch<'e, E>(executor: E, global_root_id: &str) -> Result<Option<GlobalAnchorBatch>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {BATCH_COLUMNS} FROM globalChainInfo b WHERE b.globalRootID = ?");
    let row = sqlx::query_as::<_, BatchRow>(&sql)
        .bind(global_root_id)
        .fetch_optional(executor)
        .await?;
    row.map(GlobalAnchorBatch::try_from).transpose()
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AnchorError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn insert_certificate(&self, cert: &NewCertificate) -> Result<LocalCertificate> {
        require("certID", &cert.cert_id)?;
        require("personID", &cert.person_id)?;

        let result = sqlx::query(
            r#"
            INSERT INTO localCertificate (
                certID, personID, name, brand, numOfDose, issueTime, issuer, remark
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&cert.cert_id)
        .bind(&cert.person_id)
        .bind(&cert.name)
        .bind(&cert.brand)
        .bind(cert.num_of_dose as i64)
        .bind(format_time(&cert.issue_time))
        .bind(&cert.issuer)
        .bind(&cert.remark)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(AnchorError::CertificateExists(cert.cert_id.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        debug!(cert_id = %cert.cert_id, "Certificate issued");
        fetch_certificate(&self.pool, &cert.cert_id)
            .await?
            .ok_or_else(|| AnchorError::CertificateNotFound(cert.cert_id.clone()))
    }

    async fn get_certificate(&self, cert_id: &str) -> Result<Option<LocalCertificate>> {
        fetch_certificate(&self.pool, cert_id).await
    }

    async fn get_certificates(&self, cert_ids: &[String]) -> Result<Vec<LocalCertificate>> {
        if cert_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; cert_ids.len()].join(", ");
        let sql = format!(
            "SELECT {CERT_COLUMNS} FROM localCertificate WHERE certID IN ({placeholders}) ORDER BY certID"
        );

        let mut query = sqlx::query_as::<_, CertificateRow>(&sql);
        for id in cert_ids {
            query = query.bind(id.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(LocalCertificate::try_from).collect()
    }

    async fn record_local_chain_proof(
        &self,
        cert_id: &str,
        proof: &LocalChainProof,
    ) -> Result<LocalCertificate> {
        require("localChainID", &proof.local_chain_id)?;
        require("localChainTxHash", &proof.local_chain_tx_hash)?;

        let mut tx = self.pool.begin().await?;

        let current = fetch_certificate(&mut *tx, cert_id)
            .await?
            .ok_or_else(|| AnchorError::CertificateNotFound(cert_id.to_string()))?;

        match &current.local_chain {
            Some(existing) if existing == proof => return Ok(current),
            Some(_) => return Err(AnchorError::AlreadyConfirmed(cert_id.to_string())),
            None => {}
        }

        let updated = sqlx::query(
            r#"
            UPDATE localCertificate
            SET localChainID = ?, localChainTxHash = ?,
                localChainBlockNum = ?, localChainTimeStamp = ?
            WHERE certID = ? AND localChainTxHash IS NULL
            "#,
        )
        .bind(&proof.local_chain_id)
        .bind(&proof.local_chain_tx_hash)
        .bind(proof.local_chain_block_num)
        .bind(proof.local_chain_timestamp)
        .bind(cert_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            return Err(AnchorError::AlreadyConfirmed(cert_id.to_string()));
        }

        let cert = fetch_certificate(&mut *tx, cert_id)
            .await?
            .ok_or_else(|| AnchorError::CertificateNotFound(cert_id.to_string()))?;
        tx.commit().await?;

        debug!(
            cert_id,
            local_chain_id = %proof.local_chain_id,
            block_num = proof.local_chain_block_num,
            "Local chain proof recorded"
        );
        Ok(cert)
    }

    async fn list_unbatched_confirmed(
        &self,
        local_chain_id: &str,
        limit: u32,
    ) -> Result<Vec<LocalCertificate>> {
        let sql = format!(
            r#"
            SELECT {CERT_COLUMNS}
            FROM localCertificate c
            WHERE c.localChainID = ?
              AND c.localChainTxHash IS NOT NULL
              AND NOT EXISTS (
                  SELECT 1 FROM globalChainMember m WHERE m.certID = c.certID
              )
            ORDER BY c.certID
            LIMIT ?
            "#
        );

        let rows = sqlx::query_as::<_, CertificateRow>(&sql)
            .bind(local_chain_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(LocalCertificate::try_from).collect()
    }

    async fn list_chains_with_unbatched(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT c.localChainID
            FROM localCertificate c
            WHERE c.localChainID IS NOT NULL
              AND c.localChainTxHash IS NOT NULL
              AND NOT EXISTS (
                  SELECT 1 FROM globalChainMember m WHERE m.certID = c.certID
              )
            ORDER BY c.localChainID
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn insert_batch(&self, batch: &GlobalAnchorBatch) -> Result<()> {
        require("globalRootID", &batch.global_root_id)?;
        require("localChainID", &batch.local_chain_id)?;
        require("merkleTreeRoot", &batch.merkle_tree_root)?;
        if batch.cert_id_list.is_empty() {
            return Err(AnchorError::EmptyBatch(batch.local_chain_id.clone()));
        }
        if !batch.cert_id_list.windows(2).all(|w| w[0] < w[1]) {
            return Err(AnchorError::InvalidInput(
                "certIDList must be strictly ordered by certID".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        for cert_id in &batch.cert_id_list {
            let cert = fetch_certificate(&mut *tx, cert_id)
                .await?
                .ok_or_else(|| AnchorError::CertificateNotFound(cert_id.clone()))?;

            let proof = cert
                .local_chain
                .ok_or_else(|| AnchorError::NotLocallyCommitted(cert_id.clone()))?;
            if proof.local_chain_id != batch.local_chain_id {
                return Err(AnchorError::InvalidInput(format!(
                    "certificate {cert_id} belongs to local chain {}, not {}",
                    proof.local_chain_id, batch.local_chain_id
                )));
            }

            let member: Option<(String,)> =
                sqlx::query_as("SELECT globalRootID FROM globalChainMember WHERE certID = ?")
                    .bind(cert_id.as_str())
                    .fetch_optional(&mut *tx)
                    .await?;
            if let Some((global_root_id,)) = member {
                return Err(AnchorError::AlreadyBatched {
                    cert_id: cert_id.clone(),
                    global_root_id,
                });
            }
        }

        sqlx::query(
            r#"
            INSERT INTO globalChainInfo (
                globalRootID, localChainID, merkleTreeRoot, certIDList, createdAt,
                globalChainTxHash, globalChainBlockNum, globalChainTimeStamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&batch.global_root_id)
        .bind(&batch.local_chain_id)
        .bind(&batch.merkle_tree_root)
        .bind(serde_json::to_string(&batch.cert_id_list)?)
        .bind(format_time(&batch.created_at))
        .bind(batch.global_chain.as_ref().map(|p| p.tx_hash.clone()))
        .bind(batch.global_chain.as_ref().map(|p| p.block_num))
        .bind(batch.global_chain.as_ref().map(|p| p.timestamp))
        .execute(&mut *tx)
        .await?;

        for (leaf_index, cert_id) in batch.cert_id_list.iter().enumerate() {
            sqlx::query(
                "INSERT INTO globalChainMember (certID, globalRootID, leafIndex) VALUES (?, ?, ?)",
            )
            .bind(cert_id.as_str())
            .bind(&batch.global_root_id)
            .bind(leaf_index as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            global_root_id = %batch.global_root_id,
            local_chain_id = %batch.local_chain_id,
            cert_count = batch.cert_id_list.len(),
            "Anchor batch recorded"
        );
        Ok(())
    }

    async fn get_batch(&self, global_root_id: &str) -> Result<Option<GlobalAnchorBatch>> {
        fetch_batch(&self.pool, global_root_id).await
    }

    async fn find_batch_for_certificate(
        &self,
        cert_id: &str,
    ) -> Result<Option<GlobalAnchorBatch>> {
        let sql = format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM globalChainInfo b
            JOIN globalChainMember m ON m.globalRootID = b.globalRootID
            WHERE m.certID = ?
            "#
        );

        let row = sqlx::query_as::<_, BatchRow>(&sql)
            .bind(cert_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(GlobalAnchorBatch::try_from).transpose()
    }

    async fn list_pending_write_back(&self) -> Result<Vec<GlobalAnchorBatch>> {
        let sql = format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM globalChainInfo b
            WHERE b.globalChainTxHash IS NULL
            ORDER BY b.createdAt, b.globalRootID
            "#
        );

        let rows = sqlx::query_as::<_, BatchRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(GlobalAnchorBatch::try_from).collect()
    }

    async fn record_global_chain_proof(
        &self,
        global_root_id: &str,
        proof: &GlobalChainProof,
    ) -> Result<GlobalAnchorBatch> {
        require("globalChainTxHash", &proof.tx_hash)?;

        let mut tx = self.pool.begin().await?;

        let current = fetch_batch(&mut *tx, global_root_id)
            .await?
            .ok_or_else(|| AnchorError::BatchNotFound(global_root_id.to_string()))?;

        match &current.global_chain {
            Some(existing) if existing == proof => return Ok(current),
            Some(_) => return Err(AnchorError::AlreadyWrittenBack(global_root_id.to_string())),
            None => {}
        }

        let updated = sqlx::query(
            r#"
            UPDATE globalChainInfo
            SET globalChainTxHash = ?, globalChainBlockNum = ?, globalChainTimeStamp = ?
            WHERE globalRootID = ? AND globalChainTxHash IS NULL
            "#,
        )
        .bind(&proof.tx_hash)
        .bind(proof.block_num)
        .bind(proof.timestamp)
        .bind(global_root_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            return Err(AnchorError::AlreadyWrittenBack(global_root_id.to_string()));
        }

        let batch = fetch_batch(&mut *tx, global_root_id)
            .await?
            .ok_or_else(|| AnchorError::BatchNotFound(global_root_id.to_string()))?;
        tx.commit().await?;

        info!(
            global_root_id,
            tx_hash = %proof.tx_hash,
            block_num = proof.block_num,
            "Global chain proof written back"
        );
        Ok(batch)
    }
}
