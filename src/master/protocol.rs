//! Request and response bodies of the master's HTTP API.

use super::block_master::WorkerCommand;
use crate::error::{ErrorKind, MemspaceError};
use crate::types::{BlockId, FileId, Outcome, Refusal, WorkerId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// TTL value meaning "no TTL" on the wire.
pub const NO_TTL: i64 = -1;

fn no_ttl() -> i64 {
    NO_TTL
}

/// Decode a wire TTL; any negative value means none.
pub fn ttl_from_wire(ttl_ms: i64) -> Option<Duration> {
    u64::try_from(ttl_ms).ok().map(Duration::from_millis)
}

pub fn ttl_to_wire(ttl: Option<Duration>) -> i64 {
    ttl.map(|t| i64::try_from(t.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(NO_TTL)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRequest {
    pub path: String,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRequest {
    pub file_id: FileId,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub path: String,
    pub block_size_bytes: u64,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default = "no_ttl")]
    pub ttl_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfoRequest {
    pub file_id: FileId,
    pub block_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistRequest {
    pub file_id: FileId,
    pub length: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRequest {
    pub file_id: FileId,
    pub dst_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPinnedRequest {
    pub file_id: FileId,
    pub pinned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountRequest {
    pub ns_path: String,
    pub ufs_path: String,
}

/// Lookup result; `file_id` is absent when nothing is at the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIdResponse {
    pub file_id: Option<FileId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub file_id: FileId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockIdResponse {
    pub block_id: BlockId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIdsResponse {
    pub file_ids: Vec<FileId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UfsAddressResponse {
    pub ufs_address: String,
}

/// Result of an operation that may be refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeResponse {
    pub applied: bool,
    pub refusal: Option<Refusal>,
}

impl From<Outcome> for OutcomeResponse {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Applied => Self {
                applied: true,
                refusal: None,
            },
            Outcome::Refused(reason) => Self {
                applied: false,
                refusal: Some(reason),
            },
        }
    }
}

impl OutcomeResponse {
    pub fn into_outcome(self) -> Outcome {
        match self.refusal {
            Some(reason) if !self.applied => Outcome::Refused(reason),
            _ => Outcome::Applied,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterWorkerRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterWorkerResponse {
    pub worker_id: WorkerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitBlockRequest {
    pub worker_id: WorkerId,
    pub block_id: BlockId,
    pub length: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHeartbeatRequest {
    pub worker_id: WorkerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHeartbeatResponse {
    pub commands: Vec<WorkerCommand>,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&MemspaceError> for WireError {
    fn from(err: &MemspaceError) -> Self {
        Self {
            kind: err.kind(),
            message: err.detail(),
            retryable: err.is_retryable(),
        }
    }
}

impl From<WireError> for MemspaceError {
    fn from(err: WireError) -> Self {
        MemspaceError::from_wire(err.kind, err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_wire_encoding() {
        assert_eq!(ttl_from_wire(-1), None);
        assert_eq!(ttl_from_wire(-42), None);
        assert_eq!(ttl_from_wire(1500), Some(Duration::from_millis(1500)));
        assert_eq!(ttl_to_wire(None), NO_TTL);
        assert_eq!(ttl_to_wire(Some(Duration::from_secs(2))), 2000);
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateRequest =
            serde_json::from_str(r#"{"path":"/a","block_size_bytes":512}"#).unwrap();
        assert!(!req.recursive);
        assert_eq!(ttl_from_wire(req.ttl_ms), None);
    }

    #[test]
    fn test_outcome_body() {
        let body = OutcomeResponse::from(Outcome::Refused(Refusal::MountPoint("/mnt".into())));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["applied"], false);
        assert_eq!(json["refusal"]["reason"], "mount_point");
        assert_eq!(
            body.into_outcome(),
            Outcome::Refused(Refusal::MountPoint("/mnt".into()))
        );

        let applied = OutcomeResponse::from(Outcome::Applied);
        assert!(applied.refusal.is_none());
        assert_eq!(applied.into_outcome(), Outcome::Applied);
    }
}
