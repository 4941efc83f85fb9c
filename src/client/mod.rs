//! Client library for the memspace master and workers.

use crate::error::{MemspaceError, Result};
use crate::master::protocol::*;
use crate::master::{MountInfo, WorkerCommand};
use crate::session::SessionId;
use crate::types::{BlockId, FileBlockInfo, FileId, FileInfo, Outcome, WorkerId};
use crate::worker::protocol::*;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Default connection timeout for client requests.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout for client operations.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct Empty {}

/// JSON-over-HTTP transport shared by the clients.
#[derive(Clone)]
struct Transport {
    base_url: String,
    client: Client,
}

impl Transport {
    fn new(addr: SocketAddr, connect_timeout: Duration, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: format!("http://{}", addr),
            client,
        }
    }

    async fn health(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MemspaceError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }

    /// POST `request` to `path` and decode the reply, turning error bodies
    /// back into [`MemspaceError`]s.
    async fn call<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| MemspaceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| MemspaceError::Network(e.to_string()))?;
            return Err(match serde_json::from_str::<WireError>(&body) {
                Ok(wire) => wire.into(),
                Err(_) => MemspaceError::Network(format!("{} from {}: {}", status, path, body)),
            });
        }

        response
            .json()
            .await
            .map_err(|e| MemspaceError::Deserialization(e.to_string()))
    }
}

fn parse_addr(field: &str, addr: &str) -> Result<SocketAddr> {
    addr.parse().map_err(|e| MemspaceError::InvalidConfig {
        field: field.to_string(),
        reason: format!("{}: {}", addr, e),
    })
}

/// Client for the master's client and worker APIs.
#[derive(Clone)]
pub struct MasterClient {
    http: Transport,
}

impl MasterClient {
    /// Create a new master client with default timeouts.
    pub fn new(addr: SocketAddr) -> Self {
        Self::with_timeouts(addr, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a new master client with custom timeouts.
    pub fn with_timeouts(
        addr: SocketAddr,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http: Transport::new(addr, connect_timeout, request_timeout),
        }
    }

    /// Create from address string.
    pub fn from_addr(addr: &str) -> Result<Self> {
        Ok(Self::new(parse_addr("master address", addr)?))
    }

    /// Check server health.
    pub async fn health(&self) -> Result<bool> {
        self.http.health().await
    }

    async fn call<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.http.call(path, request).await
    }

    // Client API

    pub async fn get_file_id(&self, path: &str) -> Result<Option<FileId>> {
        let response: FileIdResponse = self
            .call(
                "/api/master/get_file_id",
                &PathRequest {
                    path: path.to_string(),
                    recursive: false,
                },
            )
            .await?;
        Ok(response.file_id)
    }

    pub async fn get_file_info(&self, file_id: FileId) -> Result<FileInfo> {
        self.call("/api/master/get_file_info", &file_request(file_id, false))
            .await
    }

    pub async fn get_file_info_list(&self, file_id: FileId) -> Result<Vec<FileInfo>> {
        self.call("/api/master/get_file_info_list", &file_request(file_id, false))
            .await
    }

    pub async fn get_file_block_info(
        &self,
        file_id: FileId,
        block_index: usize,
    ) -> Result<FileBlockInfo> {
        self.call(
            "/api/master/get_file_block_info",
            &BlockInfoRequest {
                file_id,
                block_index,
            },
        )
        .await
    }

    pub async fn get_file_block_info_list(&self, file_id: FileId) -> Result<Vec<FileBlockInfo>> {
        self.call(
            "/api/master/get_file_block_info_list",
            &file_request(file_id, false),
        )
        .await
    }

    /// Create a file; `ttl` of `None` means it never expires.
    pub async fn create(
        &self,
        path: &str,
        block_size_bytes: u64,
        recursive: bool,
        ttl: Option<Duration>,
    ) -> Result<FileId> {
        let response: CreatedResponse = self
            .call(
                "/api/master/create",
                &CreateRequest {
                    path: path.to_string(),
                    block_size_bytes,
                    recursive,
                    ttl_ms: ttl_to_wire(ttl),
                },
            )
            .await?;
        Ok(response.file_id)
    }

    pub async fn complete_file(&self, file_id: FileId) -> Result<()> {
        self.call("/api/master/complete_file", &file_request(file_id, false))
            .await
    }

    pub async fn persist_file(&self, file_id: FileId, length: u64) -> Result<()> {
        self.call(
            "/api/master/persist_file",
            &PersistRequest { file_id, length },
        )
        .await
    }

    pub async fn get_new_block_id_for_file(&self, file_id: FileId) -> Result<BlockId> {
        let response: BlockIdResponse = self
            .call(
                "/api/master/get_new_block_id_for_file",
                &file_request(file_id, false),
            )
            .await?;
        Ok(response.block_id)
    }

    pub async fn delete_file(&self, file_id: FileId, recursive: bool) -> Result<Outcome> {
        let response: OutcomeResponse = self
            .call("/api/master/delete_file", &file_request(file_id, recursive))
            .await?;
        Ok(response.into_outcome())
    }

    pub async fn rename(&self, file_id: FileId, dst_path: &str) -> Result<Outcome> {
        let response: OutcomeResponse = self
            .call(
                "/api/master/rename_file",
                &RenameRequest {
                    file_id,
                    dst_path: dst_path.to_string(),
                },
            )
            .await?;
        Ok(response.into_outcome())
    }

    pub async fn set_pinned(&self, file_id: FileId, pinned: bool) -> Result<()> {
        self.call(
            "/api/master/set_pinned",
            &SetPinnedRequest { file_id, pinned },
        )
        .await
    }

    pub async fn mkdir(&self, path: &str, recursive: bool) -> Result<FileId> {
        let response: CreatedResponse = self
            .call(
                "/api/master/mkdir",
                &PathRequest {
                    path: path.to_string(),
                    recursive,
                },
            )
            .await?;
        Ok(response.file_id)
    }

    pub async fn free(&self, file_id: FileId, recursive: bool) -> Result<Outcome> {
        let response: OutcomeResponse = self
            .call("/api/master/free", &file_request(file_id, recursive))
            .await?;
        Ok(response.into_outcome())
    }

    pub async fn report_lost_file(&self, file_id: FileId) -> Result<()> {
        self.call("/api/master/report_lost_file", &file_request(file_id, false))
            .await
    }

    pub async fn load_file_info_from_ufs(&self, path: &str, recursive: bool) -> Result<FileId> {
        let response: CreatedResponse = self
            .call(
                "/api/master/load_file_info_from_ufs",
                &PathRequest {
                    path: path.to_string(),
                    recursive,
                },
            )
            .await?;
        Ok(response.file_id)
    }

    pub async fn mount(&self, ns_path: &str, ufs_path: &str) -> Result<()> {
        self.call(
            "/api/master/mount",
            &MountRequest {
                ns_path: ns_path.to_string(),
                ufs_path: ufs_path.to_string(),
            },
        )
        .await
    }

    pub async fn unmount(&self, ns_path: &str) -> Result<()> {
        self.call(
            "/api/master/unmount",
            &PathRequest {
                path: ns_path.to_string(),
                recursive: false,
            },
        )
        .await
    }

    pub async fn get_ufs_address(&self) -> Result<String> {
        let response: UfsAddressResponse =
            self.call("/api/master/get_ufs_address", &Empty {}).await?;
        Ok(response.ufs_address)
    }

    pub async fn get_lost_files(&self) -> Result<Vec<FileId>> {
        let response: FileIdsResponse = self.call("/api/master/get_lost_files", &Empty {}).await?;
        Ok(response.file_ids)
    }

    pub async fn get_mount_points(&self) -> Result<Vec<MountInfo>> {
        self.call("/api/master/get_mount_points", &Empty {}).await
    }

    // Worker API

    pub async fn register_worker(&self, address: &str) -> Result<WorkerId> {
        let response: RegisterWorkerResponse = self
            .call(
                "/api/worker/register",
                &RegisterWorkerRequest {
                    address: address.to_string(),
                },
            )
            .await?;
        Ok(response.worker_id)
    }

    pub async fn commit_block(
        &self,
        worker_id: WorkerId,
        block_id: BlockId,
        length: u64,
    ) -> Result<()> {
        self.call(
            "/api/worker/commit_block",
            &CommitBlockRequest {
                worker_id,
                block_id,
                length,
            },
        )
        .await
    }

    /// Heartbeat a worker and collect the commands queued for it.
    pub async fn worker_heartbeat(&self, worker_id: WorkerId) -> Result<Vec<WorkerCommand>> {
        let response: WorkerHeartbeatResponse = self
            .call(
                "/api/worker/heartbeat",
                &WorkerHeartbeatRequest { worker_id },
            )
            .await?;
        Ok(response.commands)
    }

    pub async fn get_pin_id_list(&self) -> Result<Vec<FileId>> {
        let response: FileIdsResponse =
            self.call("/api/worker/get_pin_id_list", &Empty {}).await?;
        Ok(response.file_ids)
    }
}

fn file_request(file_id: FileId, recursive: bool) -> FileRequest {
    FileRequest { file_id, recursive }
}

/// Client for a worker's session API.
#[derive(Clone)]
pub struct WorkerClient {
    http: Transport,
}

impl WorkerClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            http: Transport::new(addr, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT),
        }
    }

    pub fn from_addr(addr: &str) -> Result<Self> {
        Ok(Self::new(parse_addr("worker address", addr)?))
    }

    pub async fn health(&self) -> Result<bool> {
        self.http.health().await
    }

    /// Heartbeat a session; true when the worker opened it.
    pub async fn session_heartbeat(&self, session_id: SessionId) -> Result<bool> {
        let response: SessionHeartbeatResponse = self
            .http
            .call("/api/session/heartbeat", &SessionRequest { session_id })
            .await?;
        Ok(response.created)
    }

    pub async fn remove_session(&self, session_id: SessionId) -> Result<bool> {
        let response: SessionRemoveResponse = self
            .http
            .call("/api/session/remove", &SessionRequest { session_id })
            .await?;
        Ok(response.removed)
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionId>> {
        let response: SessionListResponse =
            self.http.call("/api/session/list", &Empty {}).await?;
        Ok(response.session_ids)
    }

    pub async fn status(&self) -> Result<WorkerStatus> {
        self.http.call("/api/status", &Empty {}).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_addr() {
        assert!(MasterClient::from_addr("127.0.0.1:19998").is_ok());
        assert!(MasterClient::from_addr("not-an-address").is_err());
    }

    #[test]
    fn test_worker_from_addr() {
        assert!(WorkerClient::from_addr("127.0.0.1:29998").is_ok());
        match WorkerClient::from_addr("worker-1") {
            Err(MemspaceError::InvalidConfig { field, .. }) => assert_eq!(field, "worker address"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }
}
