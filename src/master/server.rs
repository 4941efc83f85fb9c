//! HTTP API of the namespace master.

use super::mount_table::MountInfo;
use super::protocol::*;
use super::FileSystemMaster;
use crate::config::MasterConfig;
use crate::error::{ErrorKind, MemspaceError, Result};
use crate::observability::record_master_op;
use crate::types::{FileBlockInfo, FileInfo};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info};

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// A domain error on its way to the wire.
pub struct ApiError(MemspaceError);

impl From<MemspaceError> for ApiError {
    fn from(err: MemspaceError) -> Self {
        Self(err)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::FileDoesNotExist => StatusCode::NOT_FOUND,
        ErrorKind::FileAlreadyExists
        | ErrorKind::DirectoryNotEmpty
        | ErrorKind::InvalidState
        | ErrorKind::MountPointConflict => StatusCode::CONFLICT,
        ErrorKind::InvalidPath
        | ErrorKind::InvalidFileSize
        | ErrorKind::BlockInfoUnavailable
        | ErrorKind::Serialization => StatusCode::BAD_REQUEST,
        ErrorKind::StorageIo => StatusCode::BAD_GATEWAY,
        ErrorKind::Network => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Config | ErrorKind::Io | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = WireError::from(&self.0);
        debug!(kind = ?body.kind, message = %body.message, "Request failed");
        (status_for(body.kind), Json(body)).into_response()
    }
}

/// Run a call that touches the under file system on the blocking pool.
async fn blocking<T, F>(f: F) -> std::result::Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MemspaceError::Internal(format!("blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Build the API router.
pub fn router(master: Arc<FileSystemMaster>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Client API
        .route("/api/master/get_file_id", post(handle_get_file_id))
        .route("/api/master/get_file_info", post(handle_get_file_info))
        .route("/api/master/get_file_info_list", post(handle_get_file_info_list))
        .route("/api/master/get_file_block_info", post(handle_get_file_block_info))
        .route(
            "/api/master/get_file_block_info_list",
            post(handle_get_file_block_info_list),
        )
        .route("/api/master/create", post(handle_create))
        .route("/api/master/complete_file", post(handle_complete_file))
        .route("/api/master/persist_file", post(handle_persist_file))
        .route(
            "/api/master/get_new_block_id_for_file",
            post(handle_get_new_block_id_for_file),
        )
        .route("/api/master/delete_file", post(handle_delete_file))
        .route("/api/master/rename_file", post(handle_rename_file))
        .route("/api/master/set_pinned", post(handle_set_pinned))
        .route("/api/master/mkdir", post(handle_mkdir))
        .route("/api/master/free", post(handle_free))
        .route("/api/master/report_lost_file", post(handle_report_lost_file))
        .route(
            "/api/master/load_file_info_from_ufs",
            post(handle_load_file_info_from_ufs),
        )
        .route("/api/master/mount", post(handle_mount))
        .route("/api/master/unmount", post(handle_unmount))
        .route("/api/master/get_ufs_address", post(handle_get_ufs_address))
        .route("/api/master/get_lost_files", post(handle_get_lost_files))
        .route("/api/master/get_mount_points", post(handle_get_mount_points))
        // Worker API
        .route("/api/worker/register", post(handle_register_worker))
        .route("/api/worker/commit_block", post(handle_commit_block))
        .route("/api/worker/heartbeat", post(handle_worker_heartbeat))
        .route("/api/worker/get_pin_id_list", post(handle_get_pin_id_list))
        .with_state(master)
}

/// Serve the API on an already bound listener until shutdown.
pub async fn serve(
    listener: TcpListener,
    master: Arc<FileSystemMaster>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    axum::serve(listener, router(master))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|e| MemspaceError::Network(e.to_string()))
}

/// Run the master server.
pub async fn run_master_server(
    config: MasterConfig,
    master: Arc<FileSystemMaster>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, ufs = %config.ufs_address, "Master server listening");

    serve(listener, master, shutdown_rx).await?;

    info!("Master server stopped");
    Ok(())
}

// API Handlers

async fn health_check() -> &'static str {
    "OK"
}

async fn handle_get_file_id(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<PathRequest>,
) -> Json<FileIdResponse> {
    record_master_op("get_file_id");
    Json(FileIdResponse {
        file_id: master.get_file_id(&request.path),
    })
}

async fn handle_get_file_info(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<FileRequest>,
) -> ApiResult<FileInfo> {
    record_master_op("get_file_info");
    Ok(Json(master.get_file_info(request.file_id)?))
}

async fn handle_get_file_info_list(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<FileRequest>,
) -> ApiResult<Vec<FileInfo>> {
    record_master_op("get_file_info_list");
    Ok(Json(master.get_file_info_list(request.file_id)?))
}

async fn handle_get_file_block_info(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<BlockInfoRequest>,
) -> ApiResult<FileBlockInfo> {
    record_master_op("get_file_block_info");
    Ok(Json(
        master.get_file_block_info(request.file_id, request.block_index)?,
    ))
}

async fn handle_get_file_block_info_list(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<FileRequest>,
) -> ApiResult<Vec<FileBlockInfo>> {
    record_master_op("get_file_block_info_list");
    Ok(Json(master.get_file_block_info_list(request.file_id)?))
}

async fn handle_create(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<CreateRequest>,
) -> ApiResult<CreatedResponse> {
    record_master_op("create");
    let file_id = master.create(
        &request.path,
        request.block_size_bytes,
        request.recursive,
        ttl_from_wire(request.ttl_ms),
    )?;
    Ok(Json(CreatedResponse { file_id }))
}

async fn handle_complete_file(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<FileRequest>,
) -> ApiResult<()> {
    record_master_op("complete_file");
    master.complete_file(request.file_id)?;
    Ok(Json(()))
}

async fn handle_persist_file(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<PersistRequest>,
) -> ApiResult<()> {
    record_master_op("persist_file");
    master.persist_file(request.file_id, request.length)?;
    Ok(Json(()))
}

async fn handle_get_new_block_id_for_file(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<FileRequest>,
) -> ApiResult<BlockIdResponse> {
    record_master_op("get_new_block_id_for_file");
    let block_id = master.get_new_block_id_for_file(request.file_id)?;
    Ok(Json(BlockIdResponse { block_id }))
}

async fn handle_delete_file(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<FileRequest>,
) -> ApiResult<OutcomeResponse> {
    record_master_op("delete_file");
    let outcome = master.delete_file(request.file_id, request.recursive)?;
    Ok(Json(outcome.into()))
}

async fn handle_rename_file(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<RenameRequest>,
) -> ApiResult<OutcomeResponse> {
    record_master_op("rename_file");
    let outcome = master.rename(request.file_id, &request.dst_path)?;
    Ok(Json(outcome.into()))
}

async fn handle_set_pinned(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<SetPinnedRequest>,
) -> ApiResult<()> {
    record_master_op("set_pinned");
    master.set_pinned(request.file_id, request.pinned)?;
    Ok(Json(()))
}

async fn handle_mkdir(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<PathRequest>,
) -> ApiResult<CreatedResponse> {
    record_master_op("mkdir");
    let file_id = master.mkdir(&request.path, request.recursive)?;
    Ok(Json(CreatedResponse { file_id }))
}

async fn handle_free(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<FileRequest>,
) -> ApiResult<OutcomeResponse> {
    record_master_op("free");
    let outcome = master.free(request.file_id, request.recursive)?;
    Ok(Json(outcome.into()))
}

async fn handle_report_lost_file(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<FileRequest>,
) -> ApiResult<()> {
    record_master_op("report_lost_file");
    master.report_lost_file(request.file_id)?;
    Ok(Json(()))
}

async fn handle_load_file_info_from_ufs(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<PathRequest>,
) -> ApiResult<CreatedResponse> {
    record_master_op("load_file_info_from_ufs");
    let file_id =
        blocking(move || master.load_file_info_from_ufs(&request.path, request.recursive))
            .await?;
    Ok(Json(CreatedResponse { file_id }))
}

async fn handle_mount(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<MountRequest>,
) -> ApiResult<()> {
    record_master_op("mount");
    blocking(move || master.mount(&request.ns_path, &request.ufs_path)).await?;
    Ok(Json(()))
}

async fn handle_unmount(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<PathRequest>,
) -> ApiResult<()> {
    record_master_op("unmount");
    master.unmount(&request.path)?;
    Ok(Json(()))
}

async fn handle_get_ufs_address(
    State(master): State<Arc<FileSystemMaster>>,
) -> Json<UfsAddressResponse> {
    record_master_op("get_ufs_address");
    Json(UfsAddressResponse {
        ufs_address: master.get_ufs_address(),
    })
}

async fn handle_get_lost_files(
    State(master): State<Arc<FileSystemMaster>>,
) -> Json<FileIdsResponse> {
    record_master_op("get_lost_files");
    Json(FileIdsResponse {
        file_ids: master.get_lost_files(),
    })
}

async fn handle_get_mount_points(
    State(master): State<Arc<FileSystemMaster>>,
) -> Json<Vec<MountInfo>> {
    record_master_op("get_mount_points");
    Json(master.get_mount_points())
}

async fn handle_register_worker(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<RegisterWorkerRequest>,
) -> Json<RegisterWorkerResponse> {
    record_master_op("register_worker");
    Json(RegisterWorkerResponse {
        worker_id: master.block_master().register_worker(&request.address),
    })
}

async fn handle_commit_block(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<CommitBlockRequest>,
) -> ApiResult<()> {
    record_master_op("commit_block");
    master
        .block_master()
        .commit_block(request.worker_id, request.block_id, request.length)?;
    Ok(Json(()))
}

async fn handle_worker_heartbeat(
    State(master): State<Arc<FileSystemMaster>>,
    Json(request): Json<WorkerHeartbeatRequest>,
) -> ApiResult<WorkerHeartbeatResponse> {
    let commands = master.block_master().worker_heartbeat(request.worker_id)?;
    Ok(Json(WorkerHeartbeatResponse { commands }))
}

async fn handle_get_pin_id_list(
    State(master): State<Arc<FileSystemMaster>>,
) -> Json<FileIdsResponse> {
    record_master_op("get_pin_id_list");
    Json(FileIdsResponse {
        file_ids: master.get_pin_id_list().into_iter().collect(),
    })
}
