//! HTTP API of a worker: session heartbeats and status.

use super::protocol::*;
use super::Worker;
use crate::config::WorkerConfig;
use crate::error::{MemspaceError, Result};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

/// Build the worker router.
pub fn router(worker: Arc<Worker>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/session/heartbeat", post(handle_session_heartbeat))
        .route("/api/session/remove", post(handle_session_remove))
        .route("/api/session/list", post(handle_session_list))
        .route("/api/status", post(handle_status))
        .with_state(worker)
}

/// Serve the worker API on an already bound listener until shutdown.
pub async fn serve(
    listener: TcpListener,
    worker: Arc<Worker>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    axum::serve(listener, router(worker))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|e| MemspaceError::Network(e.to_string()))
}

/// Run the worker server.
pub async fn run_worker_server(
    config: WorkerConfig,
    worker: Arc<Worker>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, master = %config.master_addr, "Worker server listening");

    serve(listener, worker, shutdown_rx).await?;

    info!("Worker server stopped");
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn handle_session_heartbeat(
    State(worker): State<Arc<Worker>>,
    Json(request): Json<SessionRequest>,
) -> Json<SessionHeartbeatResponse> {
    Json(SessionHeartbeatResponse {
        created: worker.session_heartbeat(request.session_id),
    })
}

async fn handle_session_remove(
    State(worker): State<Arc<Worker>>,
    Json(request): Json<SessionRequest>,
) -> Json<SessionRemoveResponse> {
    Json(SessionRemoveResponse {
        removed: worker.sessions().remove(request.session_id),
    })
}

async fn handle_session_list(State(worker): State<Arc<Worker>>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        session_ids: worker.sessions().session_ids(),
    })
}

async fn handle_status(State(worker): State<Arc<Worker>>) -> Json<WorkerStatus> {
    Json(WorkerStatus {
        address: worker.address().to_string(),
        worker_id: worker.worker_id(),
        sessions: worker.sessions().len(),
        pinned: worker.pinned_files(),
    })
}
