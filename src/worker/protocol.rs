//! Request and response bodies of the worker session API.

use crate::session::SessionId;
use crate::types::{FileId, WorkerId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHeartbeatResponse {
    /// Whether the heartbeat opened a new session.
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRemoveResponse {
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub session_ids: Vec<SessionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub address: String,
    pub worker_id: Option<WorkerId>,
    pub sessions: usize,
    pub pinned: Vec<FileId>,
}
