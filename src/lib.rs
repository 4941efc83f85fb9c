//! memspace - namespace master and worker session registry for a
//! memory-centric distributed file system.
//!
//! The master keeps the whole file system namespace in memory: a tree of
//! files and directories, the mount table binding namespace paths to under
//! file system (UFS) locations, the pinned set and TTL index, and the block
//! bookkeeping workers report into. Each worker keeps a
//! [`session::SessionRegistry`] of client sessions, sweeps the ones whose
//! heartbeats stopped, and polls the master for commands and pinned files.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Access: MasterClient | WorkerClient | memspace fs          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Master: HTTP API | FileSystemMaster | TTL checker          │
//! │  Worker: session API | SessionRegistry | cleaner | sync     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Namespace: InodeTree | MountTable | PinnedSet | BlockMaster│
//! ├─────────────────────────────────────────────────────────────┤
//! │  Under storage: UnderFileSystem (local)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use memspace::config::MemspaceConfig;
//!
//! #[tokio::main]
//! async fn main() -> memspace::Result<()> {
//!     let config = MemspaceConfig::development();
//!     memspace::run(config).await
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod master;
pub mod observability;
pub mod path;
pub mod session;
pub mod shutdown;
pub mod types;
pub mod ufs;
pub mod worker;

// Re-exports
pub use error::{MemspaceError, Result};
pub use types::*;

use config::MemspaceConfig;
use master::{run_master_server, FileSystemMaster, TtlChecker};
use client::MasterClient;
use session::{SessionCleaner, SessionRegistry};
use shutdown::{ShutdownCoordinator, SignalHandler};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use ufs::LocalUfs;
use worker::{run_worker_server, MasterSync, Worker};

/// Run the master, its TTL checker and (optionally) the metrics server until
/// a shutdown signal arrives.
pub async fn run(config: MemspaceConfig) -> Result<()> {
    config.validate()?;
    observability::init(&config.observability)?;

    info!(ufs = %config.master.ufs_address, "Starting memspace master");

    let master = Arc::new(FileSystemMaster::from_config(
        &config.master,
        Arc::new(LocalUfs::new()),
    ));

    let coordinator = ShutdownCoordinator::new();
    let mut handles = Vec::new();

    {
        let master_config = config.master.clone();
        let master = master.clone();
        let shutdown_rx = coordinator.subscribe();
        let shutdown = coordinator.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_master_server(master_config, master, shutdown_rx).await {
                error!("Master server error: {}", e);
                shutdown.shutdown();
            }
        }));
    }

    let ttl_checker = TtlChecker::new(master.clone(), config.master.ttl_check_interval);
    handles.push(tokio::spawn(ttl_checker.run(coordinator.subscribe())));

    run_until_shutdown(&config, coordinator, handles).await;
    Ok(())
}

/// Run a worker: its session API, session cleaner, master sync loop and
/// (optionally) the metrics server until a shutdown signal arrives.
pub async fn run_worker(config: MemspaceConfig) -> Result<()> {
    config.validate()?;
    observability::init(&config.observability)?;

    info!(
        addr = %config.worker.bind_addr,
        master = %config.worker.master_addr,
        "Starting memspace worker"
    );

    let sessions = Arc::new(SessionRegistry::from_config(&config.worker));
    let worker = Arc::new(Worker::new(
        config.worker.bind_addr.to_string(),
        MasterClient::new(config.worker.master_addr),
        sessions.clone(),
    ));

    let coordinator = ShutdownCoordinator::new();
    let mut handles = Vec::new();

    {
        let worker_config = config.worker.clone();
        let worker = worker.clone();
        let shutdown_rx = coordinator.subscribe();
        let shutdown = coordinator.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_worker_server(worker_config, worker, shutdown_rx).await {
                error!("Worker server error: {}", e);
                shutdown.shutdown();
            }
        }));
    }

    let cleaner = SessionCleaner::new(sessions, config.worker.session_check_interval);
    handles.push(tokio::spawn(cleaner.run(coordinator.subscribe())));

    let sync = MasterSync::new(worker, config.worker.master_heartbeat_interval);
    handles.push(tokio::spawn(sync.run(coordinator.subscribe())));

    run_until_shutdown(&config, coordinator, handles).await;
    Ok(())
}

/// Start the metrics server and signal handler, then wait for shutdown and
/// drain `handles`.
async fn run_until_shutdown(
    config: &MemspaceConfig,
    coordinator: ShutdownCoordinator,
    mut handles: Vec<JoinHandle<()>>,
) {
    if config.observability.metrics_enabled {
        info!("Starting metrics server on {}", config.observability.metrics_addr);
        let obs_config = config.observability.clone();
        let shutdown_rx = coordinator.subscribe();

        handles.push(tokio::spawn(async move {
            if let Err(e) = observability::run_metrics_server(obs_config, shutdown_rx).await {
                error!("Metrics server error: {}", e);
            }
        }));
    }

    let signal_coordinator = coordinator.clone();
    tokio::spawn(async move {
        SignalHandler::new(signal_coordinator).run().await;
    });

    coordinator.wait_for_shutdown().await;
    info!("Shutting down memspace gracefully...");

    shutdown::drain(&coordinator, handles).await;

    info!("memspace shutdown complete");
}
