//! Logging setup
//!
//! Structured `tracing` output, human-readable or JSON, filtered by
//! `RUST_LOG` / `LOG_LEVEL`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to startup logs
    pub service_name: String,
    pub service_version: String,
    /// Emit logs to stdout
    pub enable_console: bool,
    /// One JSON object per line instead of compact text
    pub json_format: bool,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "cert-anchor".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            enable_console: true,
            json_format: false,
            log_level: "info".to_string(),
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self {
            service_name: std::env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "cert-anchor".to_string()),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            enable_console: std::env::var("LOG_CONSOLE")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            json_format: std::env::var("LOG_JSON")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            log_level: std::env::var("LOG_LEVEL")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::registry().with(config.env_filter());

    if !config.enable_console {
        subscriber.try_init()?;
    } else if config.json_format {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?;
    } else {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .compact(),
            )
            .try_init()?;
    }

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        json = config.json_format,
        "Telemetry initialized"
    );
    Ok(())
}
