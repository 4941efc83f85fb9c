//! Worker process role.
//!
//! A worker owns the [`SessionRegistry`] for the sessions touching its data
//! path, serves a small session API for clients, and keeps in touch with the
//! master: it registers, heartbeats to collect block commands, and refreshes
//! its copy of the pinned file list.

pub mod protocol;
pub mod server;

use crate::client::MasterClient;
use crate::error::{ErrorKind, Result};
use crate::master::WorkerCommand;
use crate::session::{SessionId, SessionRegistry};
use crate::types::{FileId, WorkerId};
use metrics::counter;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub use server::{run_worker_server, serve};

/// State shared by a worker's API server and its master sync loop.
pub struct Worker {
    /// Address the worker registers under.
    address: String,
    master: MasterClient,
    sessions: Arc<SessionRegistry>,
    worker_id: RwLock<Option<WorkerId>>,
    /// Files the master has exempted from eviction, as of the last sync.
    pinned: RwLock<BTreeSet<FileId>>,
}

impl Worker {
    pub fn new(
        address: impl Into<String>,
        master: MasterClient,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            address: address.into(),
            master,
            sessions,
            worker_id: RwLock::new(None),
            pinned: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Id assigned by the master, once registered.
    pub fn worker_id(&self) -> Option<WorkerId> {
        *self.worker_id.read()
    }

    pub fn pinned_files(&self) -> Vec<FileId> {
        self.pinned.read().iter().copied().collect()
    }

    pub fn is_pinned(&self, file_id: FileId) -> bool {
        self.pinned.read().contains(&file_id)
    }

    /// Record a client heartbeat; true when it opened a new session.
    pub fn session_heartbeat(&self, session_id: SessionId) -> bool {
        self.sessions.heartbeat(session_id)
    }

    /// Register with the master, keeping any id already held.
    pub async fn register(&self) -> Result<WorkerId> {
        if let Some(id) = self.worker_id() {
            return Ok(id);
        }
        let id = self.master.register_worker(&self.address).await?;
        *self.worker_id.write() = Some(id);
        info!(worker = id, address = %self.address, "Registered with master");
        Ok(id)
    }

    /// One round trip with the master: heartbeat, then refresh pins.
    ///
    /// Returns the commands the master had queued for this worker. If the
    /// master no longer knows the worker, the id is dropped so the next sync
    /// registers again.
    pub async fn sync_with_master(&self) -> Result<Vec<WorkerCommand>> {
        let id = self.register().await?;

        let commands = match self.master.worker_heartbeat(id).await {
            Ok(commands) => commands,
            Err(e) => {
                if e.kind() == ErrorKind::InvalidState {
                    warn!(worker = id, "Master forgot this worker, re-registering");
                    *self.worker_id.write() = None;
                }
                return Err(e);
            }
        };
        for command in &commands {
            apply_command(command);
        }

        let pinned = self.master.get_pin_id_list().await?;
        *self.pinned.write() = pinned.into_iter().collect();

        Ok(commands)
    }
}

fn apply_command(command: &WorkerCommand) {
    let (name, block_ids) = match command {
        WorkerCommand::Free { block_ids } => ("free", block_ids),
        WorkerCommand::Delete { block_ids } => ("delete", block_ids),
    };
    counter!("memspace_worker_commands_total", "command" => name).increment(1);
    debug!(command = name, blocks = block_ids.len(), "Master command received");
}

/// Background task syncing `worker` with the master until shutdown.
pub struct MasterSync {
    worker: Arc<Worker>,
    interval: Duration,
}

impl MasterSync {
    pub fn new(worker: Arc<Worker>, interval: Duration) -> Self {
        Self { worker, interval }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.interval);

        info!(
            interval_ms = self.interval.as_millis() as u64,
            address = %self.worker.address(),
            "Master sync starting"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.worker.sync_with_master().await {
                        Ok(commands) => debug!(
                            commands = commands.len(),
                            sessions = self.worker.sessions().len(),
                            "Master sync completed"
                        ),
                        Err(e) => warn!(error = %e, "Master sync failed"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Master sync shutting down");
                    break;
                }
            }
        }
    }
}
