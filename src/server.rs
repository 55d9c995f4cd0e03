//! HTTP server bootstrap for the certificate anchoring service.
//!
//! This module wires together:
//! - configuration
//! - the local certificate store (SQLite)
//! - the ledger gateway, coordinator and verifier
//! - the background anchoring worker
//! - the Axum router

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::anchor::InProcessGateway;
use crate::infra::{
    spawn_anchor_worker, AnchorCoordinator, AnchorWorkerConfig, AnchorWorkerMessage,
    CoordinatorConfig, LedgerGateway, SqliteLocalStore, Verifier,
};
use crate::telemetry::{init_telemetry, TelemetryConfig};

/// Coordinator over the production store and gateway
pub type Coordinator = AnchorCoordinator<SqliteLocalStore, InProcessGateway>;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL.
    pub database_url: String,
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Maximum database connections.
    pub max_connections: u32,
    /// Apply migrations before serving.
    pub migrate_on_startup: bool,
    /// Submit `InitLedger` on startup.
    pub seed_ledger: bool,
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            )
        })
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://cert_anchor.db".to_string());

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;

        let max_connections: u32 = std::env::var("MAX_DB_CONNECTIONS")
            .ok()
            .and_then(|p| p.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(5);

        Ok(Self {
            database_url,
            listen_addr,
            max_connections,
            migrate_on_startup: env_flag("DB_MIGRATE_ON_STARTUP", true),
            seed_ledger: env_flag("LEDGER_SEED_ON_STARTUP", false),
        })
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteLocalStore>,
    pub gateway: Arc<InProcessGateway>,
    pub coordinator: Arc<Coordinator>,
    pub verifier: Arc<Verifier<SqliteLocalStore, InProcessGateway>>,
}

impl AppState {
    pub fn new(
        store: Arc<SqliteLocalStore>,
        gateway: Arc<InProcessGateway>,
        config: CoordinatorConfig,
    ) -> Self {
        let coordinator = Arc::new(AnchorCoordinator::new(
            store.clone(),
            gateway.clone(),
            config,
        ));
        let verifier = Arc::new(Verifier::new(store.clone(), gateway.clone()));
        Self {
            store,
            gateway,
            coordinator,
            verifier,
        }
    }
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_telemetry(&TelemetryConfig::from_env())?;

    info!("Starting cert-anchor v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(
        listen_addr = %config.listen_addr,
        max_connections = config.max_connections,
        "Configuration loaded"
    );

    let store = SqliteLocalStore::connect(&config.database_url, config.max_connections).await?;
    info!("Connected to local store");

    if config.migrate_on_startup {
        info!("Running database migrations...");
        crate::migrations::run_sqlite(store.pool()).await?;
        info!("Database migrations applied");
    } else {
        info!("DB migrations skipped (DB_MIGRATE_ON_STARTUP=0)");
    }

    let gateway = Arc::new(InProcessGateway::ephemeral());
    if config.seed_ledger {
        let record = gateway.init_ledger().await?;
        info!(tx_id = %record.tx_id, "Ledger seeded with sentinel asset");
    }

    let coordinator_config = CoordinatorConfig::from_env();
    info!(
        max_batch_size = coordinator_config.max_batch_size,
        min_batch_size = coordinator_config.min_batch_size,
        "Coordinator configured"
    );
    let state = AppState::new(Arc::new(store), gateway, coordinator_config);

    let worker_config = AnchorWorkerConfig::from_env();
    let worker = if worker_config.enabled {
        Some(spawn_anchor_worker(worker_config, state.coordinator.clone()))
    } else {
        info!("Anchoring worker disabled (ANCHOR_WORKER_ENABLED=0)");
        None
    };

    let app = build_router()?.with_state(state);

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some((handle, control)) = worker {
        if control.send(AnchorWorkerMessage::Shutdown).await.is_err() {
            warn!("Anchoring worker already stopped");
        }
        if let Err(e) = handle.await {
            error!(error = %e, "Anchoring worker task failed");
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Build the full router: legacy contract routes, `/api`, health probes.
pub fn build_router() -> anyhow::Result<Router<AppState>> {
    let mut router = Router::new()
        .merge(crate::api::legacy_router())
        .nest("/api", crate::api::router())
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors_layer_from_env()? {
        router = router.layer(cors_layer);
    }

    Ok(router)
}

fn cors_layer_from_env() -> anyhow::Result<Option<CorsLayer>> {
    let origins = match std::env::var("CORS_ALLOW_ORIGINS") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let origins = origins.trim();
    if origins.is_empty() {
        return Ok(None);
    }

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE]),
    ))
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating shutdown..."),
    }
}

/// Health check endpoint.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "cert-anchor",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check endpoint.
async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    match sqlx::query("SELECT 1").execute(state.store.pool()).await {
        Ok(_) => Ok(Json(serde_json::json!({
            "status": "ready",
            "database": "connected",
            "ledgerHeight": state.gateway.world().height(),
        }))),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Database unavailable: {}", e),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_flag_parsing() {
        std::env::set_var("CERT_ANCHOR_TEST_FLAG", "off");
        assert!(!env_flag("CERT_ANCHOR_TEST_FLAG", true));
        std::env::set_var("CERT_ANCHOR_TEST_FLAG", "1");
        assert!(env_flag("CERT_ANCHOR_TEST_FLAG", false));
        std::env::remove_var("CERT_ANCHOR_TEST_FLAG");
        assert!(env_flag("CERT_ANCHOR_TEST_FLAG", true));
    }
}
