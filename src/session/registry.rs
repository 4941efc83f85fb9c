//! Registry of live sessions on a worker.

use super::info::{SessionId, SessionInfo};
use crate::config::WorkerConfig;
use metrics::gauge;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Tracks the liveness of every session touching a worker's data path.
///
/// Heartbeats are the only renewal signal. The registry is purely reactive:
/// it owns no threads, and a periodic sweep (see
/// [`SessionCleaner`](super::SessionCleaner)) is expected to call
/// [`list_timed_out`](Self::list_timed_out) and [`remove`](Self::remove).
pub struct SessionRegistry {
    /// All sessions, guarded by one registry-wide lock.
    sessions: Mutex<HashMap<SessionId, SessionInfo>>,
    /// Timeout given to sessions created by a heartbeat.
    default_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            default_timeout,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.session_timeout)
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Record a heartbeat for `session_id`, creating the session if unseen.
    ///
    /// Returns true when this heartbeat created the session.
    pub fn heartbeat(&self, session_id: SessionId) -> bool {
        let mut sessions = self.sessions.lock();
        // Read the clock under the lock so concurrent heartbeats apply in
        // the order they observed time.
        let now = Instant::now();
        Self::record(&mut sessions, session_id, self.default_timeout, now)
    }

    /// Record a heartbeat observed at `now`.
    pub fn heartbeat_at(&self, session_id: SessionId, now: Instant) -> bool {
        let mut sessions = self.sessions.lock();
        Self::record(&mut sessions, session_id, self.default_timeout, now)
    }

    fn record(
        sessions: &mut HashMap<SessionId, SessionInfo>,
        session_id: SessionId,
        timeout: Duration,
        now: Instant,
    ) -> bool {
        match sessions.get_mut(&session_id) {
            Some(info) => {
                info.heartbeat_at(now);
                false
            }
            None => {
                sessions.insert(session_id, SessionInfo::new_at(session_id, timeout, now));
                gauge!("memspace_sessions_active").set(sessions.len() as f64);
                info!(session = %session_id, "Session started");
                true
            }
        }
    }

    /// Ids of sessions whose last heartbeat is older than their timeout.
    pub fn list_timed_out(&self) -> Vec<SessionId> {
        self.list_timed_out_at(Instant::now())
    }

    pub fn list_timed_out_at(&self, now: Instant) -> Vec<SessionId> {
        debug!("Checking sessions for timeouts");
        let sessions = self.sessions.lock();
        let mut timed_out: Vec<SessionId> = sessions
            .values()
            .filter(|info| info.is_timed_out_at(now))
            .map(|info| info.session_id())
            .collect();
        timed_out.sort();
        timed_out
    }

    /// Forget a session. Removing an unknown id is a no-op.
    ///
    /// Returns true when an entry was removed.
    pub fn remove(&self, session_id: SessionId) -> bool {
        let mut sessions = self.sessions.lock();
        let removed = sessions.remove(&session_id).is_some();
        if removed {
            gauge!("memspace_sessions_active").set(sessions.len() as f64);
            info!(session = %session_id, "Cleaning up session");
        }
        removed
    }

    /// Copy of a session's current state.
    pub fn get(&self, session_id: SessionId) -> Option<SessionInfo> {
        self.sessions.lock().get(&session_id).cloned()
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.sessions.lock().contains_key(&session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// All known session ids, sorted.
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.lock().keys().copied().collect();
        ids.sort();
        ids
    }
}
