//! Session identity and liveness state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Identifier of a session touching a worker's data path.
///
/// Client sessions are positive. A handful of negative ids are reserved for
/// the worker's own subsystems, see [`ReservedSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(i64);

impl SessionId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// The internal subsystem this id is reserved for, if any.
    pub fn reserved(&self) -> Option<ReservedSession> {
        ReservedSession::ALL
            .into_iter()
            .find(|r| r.session_id() == *self)
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved().is_some()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reserved() {
            Some(r) => write!(f, "{}({})", r.name(), self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<ReservedSession> for SessionId {
    fn from(reserved: ReservedSession) -> Self {
        reserved.session_id()
    }
}

/// Fixed internal channels that hold sessions on a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservedSession {
    /// Block data transfer server.
    DataServer,
    /// Checkpoint writer.
    Checkpoint,
    /// Data migration between tiers.
    MigrateData,
    /// Commands issued by the master.
    MasterCommand,
    /// Block access bookkeeping.
    AccessBlock,
}

impl ReservedSession {
    pub const ALL: [ReservedSession; 5] = [
        ReservedSession::DataServer,
        ReservedSession::Checkpoint,
        ReservedSession::MigrateData,
        ReservedSession::MasterCommand,
        ReservedSession::AccessBlock,
    ];

    pub const fn session_id(self) -> SessionId {
        match self {
            ReservedSession::DataServer => SessionId(-1),
            ReservedSession::Checkpoint => SessionId(-2),
            ReservedSession::MigrateData => SessionId(-3),
            ReservedSession::MasterCommand => SessionId(-4),
            ReservedSession::AccessBlock => SessionId(-5),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReservedSession::DataServer => "data_server",
            ReservedSession::Checkpoint => "checkpoint",
            ReservedSession::MigrateData => "migrate_data",
            ReservedSession::MasterCommand => "master_command",
            ReservedSession::AccessBlock => "access_block",
        }
    }
}

/// Liveness record for one session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    session_id: SessionId,
    last_heartbeat: Instant,
    timeout: Duration,
}

impl SessionInfo {
    /// Create a session whose first heartbeat is now.
    pub fn new(session_id: SessionId, timeout: Duration) -> Self {
        Self::new_at(session_id, timeout, Instant::now())
    }

    pub fn new_at(session_id: SessionId, timeout: Duration, now: Instant) -> Self {
        Self {
            session_id,
            last_heartbeat: now,
            timeout,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn last_heartbeat(&self) -> Instant {
        self.last_heartbeat
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record a heartbeat now.
    pub fn heartbeat(&mut self) {
        self.heartbeat_at(Instant::now());
    }

    /// Record a heartbeat at `now`. The last heartbeat never moves backwards.
    pub fn heartbeat_at(&mut self, now: Instant) {
        if now > self.last_heartbeat {
            self.last_heartbeat = now;
        }
    }

    pub fn is_timed_out(&self) -> bool {
        self.is_timed_out_at(Instant::now())
    }

    /// Timed out once strictly more than `timeout` has passed since the last
    /// heartbeat.
    pub fn is_timed_out_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_heartbeat) > self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_ids_are_fixed_and_negative() {
        let ids: Vec<i64> = ReservedSession::ALL
            .iter()
            .map(|r| r.session_id().as_i64())
            .collect();
        assert_eq!(ids, vec![-1, -2, -3, -4, -5]);
        assert_eq!(
            SessionId::new(-4).reserved(),
            Some(ReservedSession::MasterCommand)
        );
        assert!(!SessionId::new(42).is_reserved());
        assert!(!SessionId::new(-6).is_reserved());
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionId::from(ReservedSession::Checkpoint).to_string(), "checkpoint(-2)");
        assert_eq!(SessionId::new(7).to_string(), "7");
    }

    #[test]
    fn test_timeout_boundary() {
        let start = Instant::now();
        let info = SessionInfo::new_at(SessionId::new(1), Duration::from_millis(100), start);

        assert!(!info.is_timed_out_at(start + Duration::from_millis(100)));
        assert!(info.is_timed_out_at(start + Duration::from_millis(101)));
    }

    #[test]
    fn test_heartbeat_never_moves_backwards() {
        let start = Instant::now();
        let mut info = SessionInfo::new_at(SessionId::new(1), Duration::from_secs(1), start);

        info.heartbeat_at(start + Duration::from_millis(50));
        info.heartbeat_at(start + Duration::from_millis(10));
        assert_eq!(info.last_heartbeat(), start + Duration::from_millis(50));
    }
}
