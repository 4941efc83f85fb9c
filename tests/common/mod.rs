//! Common test utilities for integration tests.

use memspace::client::{MasterClient, WorkerClient};
use memspace::master::{server, BlockMaster, FileSystemMaster};
use memspace::session::SessionRegistry;
use memspace::shutdown::ShutdownCoordinator;
use memspace::ufs::LocalUfs;
use memspace::worker::{self, Worker};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Block size used by test masters; small enough to split tiny files.
pub const TEST_BLOCK_SIZE: u64 = 64;

/// Test environment with an on-disk under file system.
///
/// `ufs_root` backs the namespace root; `external` is a sibling tree that
/// tests mount elsewhere.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub ufs_root: PathBuf,
    pub external: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let ufs_root = temp_dir.path().join("underfs");
        let external = temp_dir.path().join("external");

        std::fs::create_dir_all(&ufs_root).expect("Failed to create ufs root");
        std::fs::create_dir_all(&external).expect("Failed to create external dir");

        Self {
            temp_dir,
            ufs_root,
            external,
        }
    }

    pub fn ufs_address(&self) -> String {
        self.ufs_root.to_string_lossy().into_owned()
    }

    pub fn external_address(&self) -> String {
        self.external.to_string_lossy().into_owned()
    }

    /// A master rooted at `ufs_root`.
    pub fn master(&self) -> FileSystemMaster {
        FileSystemMaster::new(
            self.ufs_address(),
            TEST_BLOCK_SIZE,
            Arc::new(LocalUfs::new()),
            Arc::new(BlockMaster::new()),
        )
    }

    /// Write a file of random bytes at `relative` under `base`, creating
    /// parent directories.
    pub fn write_file(&self, base: &Path, relative: &str, size: usize) -> PathBuf {
        use rand::Rng;
        let path = base.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        let mut content = vec![0u8; size];
        rand::thread_rng().fill(&mut content[..]);
        std::fs::write(&path, &content).expect("Failed to write test file");
        path
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// A master API served on an ephemeral local port.
pub struct TestServer {
    pub master: Arc<FileSystemMaster>,
    pub client: MasterClient,
    pub coordinator: ShutdownCoordinator,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(master: FileSystemMaster) -> Self {
        let master = Arc::new(master);
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");

        let coordinator = ShutdownCoordinator::new();
        let shutdown_rx = coordinator.subscribe();
        let server_master = master.clone();
        let handle = tokio::spawn(async move {
            server::serve(listener, server_master, shutdown_rx)
                .await
                .expect("Server failed");
        });

        Self {
            master,
            client: MasterClient::new(addr),
            coordinator,
            handle,
        }
    }

    pub async fn stop(self) {
        self.coordinator.shutdown();
        self.handle.await.expect("Server task panicked");
    }
}

/// A worker session API on an ephemeral local port.
pub struct TestWorker {
    pub worker: Arc<Worker>,
    pub client: WorkerClient,
    pub coordinator: ShutdownCoordinator,
    handle: JoinHandle<()>,
}

impl TestWorker {
    pub async fn start(master: MasterClient, session_timeout: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");

        let sessions = Arc::new(SessionRegistry::new(session_timeout));
        let worker = Arc::new(Worker::new(addr.to_string(), master, sessions));

        let coordinator = ShutdownCoordinator::new();
        let shutdown_rx = coordinator.subscribe();
        let server_worker = worker.clone();
        let handle = tokio::spawn(async move {
            worker::serve(listener, server_worker, shutdown_rx)
                .await
                .expect("Worker server failed");
        });

        Self {
            worker,
            client: WorkerClient::new(addr),
            coordinator,
            handle,
        }
    }

    pub async fn stop(self) {
        self.coordinator.shutdown();
        self.handle.await.expect("Worker task panicked");
    }
}
