//! Observability module for memspace.
//!
//! Provides logging and Prometheus metrics.

use crate::config::ObservabilityConfig;
use crate::error::{MemspaceError, Result};
use ::tracing::info;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging. `RUST_LOG` overrides the configured level.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| MemspaceError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| MemspaceError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!("Observability initialized");
    Ok(())
}

/// Run the Prometheus metrics server until shutdown.
pub async fn run_metrics_server(
    config: ObservabilityConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        MemspaceError::Internal(format!("Failed to install metrics recorder: {}", e))
    })?;

    register_metrics();

    let app = axum::Router::new()
        .route(
            "/metrics",
            axum::routing::get(move || async move { handle.render() }),
        )
        .route("/health", axum::routing::get(|| async { "OK" }));

    let listener = TcpListener::bind(config.metrics_addr).await?;
    info!(addr = %config.metrics_addr, "Metrics server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|e| MemspaceError::Network(e.to_string()))?;

    Ok(())
}

/// Register standard metrics.
fn register_metrics() {
    // Namespace
    gauge!("memspace_master_inodes_total").set(0.0);
    counter!("memspace_master_ops_total").absolute(0);
    counter!("memspace_ttl_expired_total").absolute(0);

    // Sessions
    gauge!("memspace_sessions_active").set(0.0);
    counter!("memspace_sessions_timed_out_total").absolute(0);
}

/// Record a master API call.
pub fn record_master_op(op: &str) {
    counter!("memspace_master_ops_total", "op" => op.to_string()).increment(1);
}

/// Record files deleted because their TTL elapsed.
pub fn record_ttl_expired(count: usize) {
    counter!("memspace_ttl_expired_total").increment(count as u64);
}

pub fn update_namespace_metrics(inodes: usize) {
    gauge!("memspace_master_inodes_total").set(inodes as f64);
}
