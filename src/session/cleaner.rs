//! Periodic sweep of timed-out sessions.

use super::info::SessionId;
use super::registry::SessionRegistry;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

type CleanupHook = Box<dyn Fn(SessionId) + Send + Sync>;

/// Background task that reclaims sessions whose heartbeats stopped.
///
/// Each pass lists the timed-out sessions, runs the cleanup hook for each
/// (releasing whatever the worker holds for that session), then removes it
/// from the registry.
pub struct SessionCleaner {
    registry: Arc<SessionRegistry>,
    check_interval: Duration,
    on_cleanup: Option<CleanupHook>,
}

impl SessionCleaner {
    pub fn new(registry: Arc<SessionRegistry>, check_interval: Duration) -> Self {
        Self {
            registry,
            check_interval,
            on_cleanup: None,
        }
    }

    /// Set the callback run for each timed-out session before it is removed.
    pub fn on_cleanup<F>(mut self, callback: F) -> Self
    where
        F: Fn(SessionId) + Send + Sync + 'static,
    {
        self.on_cleanup = Some(Box::new(callback));
        self
    }

    /// Run one pass and return the ids that were cleaned up.
    pub fn sweep(&self) -> Vec<SessionId> {
        let timed_out = self.registry.list_timed_out();
        let mut cleaned = Vec::with_capacity(timed_out.len());

        for session_id in timed_out {
            warn!(session = %session_id, "Session timed out");
            if let Some(ref callback) = self.on_cleanup {
                callback(session_id);
            }
            // A session may have been removed concurrently by its owner.
            if self.registry.remove(session_id) {
                counter!("memspace_sessions_timed_out_total").increment(1);
                cleaned.push(session_id);
            }
        }

        cleaned
    }

    /// Run the sweep as a background task until shutdown.
    pub async fn run(self, mut shutdown_rx: tokio::sync::broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.check_interval);

        info!(
            interval_ms = self.check_interval.as_millis() as u64,
            "Session cleaner starting"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let cleaned = self.sweep();
                    debug!(
                        cleaned = cleaned.len(),
                        remaining = self.registry.len(),
                        "Session sweep completed"
                    );
                }
                _ = shutdown_rx.recv() => {
                    info!("Session cleaner shutting down");
                    break;
                }
            }
        }
    }
}
