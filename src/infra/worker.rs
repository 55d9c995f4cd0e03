//! Background anchoring worker
//!
//! Periodically anchors every local chain with confirmed certificates and
//! runs a reconciliation pass for batches left pending by earlier failures.
//!
//! # Configuration
//!
//! - `ANCHOR_WORKER_ENABLED` - Run the worker at all (default: true)
//! - `ANCHOR_INTERVAL_SECS` - Seconds between anchoring passes (default: 30)

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::{AnchorCoordinator, AnchorReceipt, LedgerGateway, LocalStore, ReconcileReport, Result};

/// Configuration for the anchoring worker
#[derive(Debug, Clone)]
pub struct AnchorWorkerConfig {
    pub enabled: bool,
    /// Time between anchoring passes
    pub interval: Duration,
}

impl Default for AnchorWorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(30),
        }
    }
}

impl AnchorWorkerConfig {
    /// Load configuration from environment
    pub fn from_env() -> Self {
        let enabled = std::env::var("ANCHOR_WORKER_ENABLED")
            .ok()
            .map(|s| {
                !matches!(
                    s.trim().to_ascii_lowercase().as_str(),
                    "0" | "false" | "no" | "off"
                )
            })
            .unwrap_or(true);

        let interval = std::env::var("ANCHOR_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Self { enabled, interval }
    }
}

/// Control messages for the worker
#[derive(Debug)]
pub enum AnchorWorkerMessage {
    /// Anchor one local chain now
    ForceAnchor {
        local_chain_id: String,
        reply: Option<oneshot::Sender<Result<Option<AnchorReceipt>>>>,
    },
    /// Run a reconciliation pass now
    Reconcile {
        reply: Option<oneshot::Sender<Result<ReconcileReport>>>,
    },
    /// Stop the worker
    Shutdown,
}

/// Anchoring worker
pub struct AnchorWorker<S, G> {
    config: AnchorWorkerConfig,
    coordinator: Arc<AnchorCoordinator<S, G>>,
    control_tx: mpsc::Sender<AnchorWorkerMessage>,
    control_rx: mpsc::Receiver<AnchorWorkerMessage>,
}

impl<S, G> AnchorWorker<S, G>
where
    S: LocalStore + 'static,
    G: LedgerGateway + 'static,
{
    pub fn new(config: AnchorWorkerConfig, coordinator: Arc<AnchorCoordinator<S, G>>) -> Self {
        let (control_tx, control_rx) = mpsc::channel(16);
        Self {
            config,
            coordinator,
            control_tx,
            control_rx,
        }
    }

    /// Sender handle for controlling the worker
    pub fn control_handle(&self) -> mpsc::Sender<AnchorWorkerMessage> {
        self.control_tx.clone()
    }

    /// Run until `Shutdown` is received or every control handle is dropped
    pub async fn run(self) {
        let AnchorWorker {
            config,
            coordinator,
            control_tx,
            mut control_rx,
        } = self;
        // Only external handles keep the channel open
        drop(control_tx);

        info!(
            interval_secs = config.interval.as_secs(),
            "Starting anchoring worker"
        );

        // Finish anything a previous run left behind before building new batches
        reconcile_pass(&coordinator).await;

        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    anchor_pass(&coordinator).await;
                    reconcile_pass(&coordinator).await;
                }
                msg = control_rx.recv() => {
                    match msg {
                        Some(AnchorWorkerMessage::ForceAnchor { local_chain_id, reply }) => {
                            info!(local_chain_id = %local_chain_id, "Forcing anchor");
                            let result = coordinator.anchor_chain(&local_chain_id).await;
                            if let Err(e) = &result {
                                error!(
                                    local_chain_id = %local_chain_id,
                                    error = %e,
                                    "Forced anchor failed"
                                );
                            }
                            if let Some(reply) = reply {
                                let _ = reply.send(result);
                            }
                        }
                        Some(AnchorWorkerMessage::Reconcile { reply }) => {
                            let result = coordinator.reconcile().await;
                            if let Some(reply) = reply {
                                let _ = reply.send(result);
                            }
                        }
                        Some(AnchorWorkerMessage::Shutdown) | None => {
                            info!("Anchoring worker shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }
}

async fn anchor_pass<S: LocalStore, G: LedgerGateway>(coordinator: &AnchorCoordinator<S, G>) {
    debug!("Checking for certificates to anchor");
    match coordinator.anchor_pending().await {
        Ok(receipts) if !receipts.is_empty() => {
            info!(batches = receipts.len(), "Anchoring pass finished");
        }
        Ok(_) => {}
        Err(e) => error!(error = %e, "Anchoring pass failed"),
    }
}

async fn reconcile_pass<S: LocalStore, G: LedgerGateway>(coordinator: &AnchorCoordinator<S, G>) {
    if let Err(e) = coordinator.reconcile().await {
        error!(error = %e, "Reconciliation pass failed");
    }
}

/// Spawn the worker as a background task
pub fn spawn_anchor_worker<S, G>(
    config: AnchorWorkerConfig,
    coordinator: Arc<AnchorCoordinator<S, G>>,
) -> (
    tokio::task::JoinHandle<()>,
    mpsc::Sender<AnchorWorkerMessage>,
)
where
    S: LocalStore + 'static,
    G: LedgerGateway + 'static,
{
    let worker = AnchorWorker::new(config, coordinator);
    let control_handle = worker.control_handle();
    let handle = tokio::spawn(worker.run());
    (handle, control_handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = AnchorWorkerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval, Duration::from_secs(30));
    }
}
