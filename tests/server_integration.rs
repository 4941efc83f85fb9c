//! Integration tests for the master HTTP API through `MasterClient`.

#[allow(dead_code)]
mod common;

use common::{TestEnv, TestServer, TEST_BLOCK_SIZE};
use memspace::error::{ErrorKind, MemspaceError};
use memspace::master::WorkerCommand;
use memspace::types::{Outcome, Refusal, ROOT_ID};
use std::time::Duration;

#[tokio::test]
async fn test_health() {
    let env = TestEnv::new();
    let server = TestServer::start(env.master()).await;

    assert!(server.client.health().await.unwrap());

    server.stop().await;
}

#[tokio::test]
async fn test_file_lifecycle_over_http() {
    let env = TestEnv::new();
    let server = TestServer::start(env.master()).await;
    let client = &server.client;

    let id = client
        .create("/logs/app.log", TEST_BLOCK_SIZE, true, None)
        .await
        .unwrap();
    assert_eq!(client.get_file_id("/logs/app.log").await.unwrap(), Some(id));
    assert_eq!(client.get_file_id("/logs/none").await.unwrap(), None);

    let worker = client.register_worker("worker-1:29998").await.unwrap();
    let mut blocks = Vec::new();
    for length in [64, 20] {
        let block_id = client.get_new_block_id_for_file(id).await.unwrap();
        client.commit_block(worker, block_id, length).await.unwrap();
        blocks.push(block_id);
    }
    client.complete_file(id).await.unwrap();
    client.persist_file(id, 84).await.unwrap();

    let info = client.get_file_info(id).await.unwrap();
    assert_eq!(info.block_ids, blocks);
    assert_eq!(info.length, 84);
    assert!(info.is_persisted);

    let block = client.get_file_block_info(id, 1).await.unwrap();
    assert_eq!(block.offset, 64);
    assert_eq!(block.block_info.locations[0].address, "worker-1:29998");
    assert_eq!(client.get_file_block_info_list(id).await.unwrap().len(), 2);

    let err = client.get_new_block_id_for_file(id).await.unwrap_err();
    assert!(matches!(err, MemspaceError::InvalidState(_)));

    server.stop().await;
}

#[tokio::test]
async fn test_errors_round_trip() {
    let env = TestEnv::new();
    let server = TestServer::start(env.master()).await;
    let client = &server.client;

    let err = client.get_file_info(4242).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileDoesNotExist);
    assert!(err.to_string().contains("4242"));
    assert!(!err.is_retryable());

    client.create("/dup", 512, false, None).await.unwrap();
    let err = client.create("/dup", 512, false, None).await.unwrap_err();
    assert!(matches!(err, MemspaceError::FileAlreadyExists(_)));

    let err = client.create("/zero", 0, false, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFileSize);

    let err = client.mkdir("relative", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath);

    server.stop().await;
}

#[tokio::test]
async fn test_refusals_over_http() {
    let env = TestEnv::new();
    let server = TestServer::start(env.master()).await;
    let client = &server.client;

    assert_eq!(
        client.delete_file(ROOT_ID, true).await.unwrap(),
        Outcome::Refused(Refusal::RootDirectory)
    );

    let dir = client.mkdir("/d", false).await.unwrap();
    let f = client.create("/d/f", 512, false, None).await.unwrap();
    let err = client.delete_file(dir, false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DirectoryNotEmpty);

    client.set_pinned(f, true).await.unwrap();
    assert_eq!(client.get_pin_id_list().await.unwrap(), vec![f]);
    assert_eq!(
        client.free(f, false).await.unwrap(),
        Outcome::Refused(Refusal::Pinned("/d/f".to_string()))
    );
    client.set_pinned(f, false).await.unwrap();
    assert!(client.get_pin_id_list().await.unwrap().is_empty());

    assert_eq!(client.rename(f, "/g").await.unwrap(), Outcome::Applied);
    assert_eq!(client.get_file_id("/g").await.unwrap(), Some(f));
    assert_eq!(client.get_file_id("/d/f").await.unwrap(), None);

    assert_eq!(client.delete_file(dir, true).await.unwrap(), Outcome::Applied);

    server.stop().await;
}

#[tokio::test]
async fn test_mount_and_load_over_http() {
    let env = TestEnv::new();
    env.write_file(&env.external, "a/b.bin", 100);
    let server = TestServer::start(env.master()).await;
    let client = &server.client;

    assert_eq!(client.get_ufs_address().await.unwrap(), env.ufs_address());

    client.mount("/ext", &env.external_address()).await.unwrap();
    let mounts = client.get_mount_points().await.unwrap();
    assert_eq!(mounts.len(), 2);
    assert_eq!(mounts[1].ns_path.as_str(), "/ext");

    let a = client.load_file_info_from_ufs("/ext/a", false).await.unwrap();
    let listing = client.get_file_info_list(a).await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].name, "b.bin");
    assert_eq!(listing[0].length, 100);
    assert_eq!(listing[0].block_ids.len(), 2);

    let err = client
        .mount("/missing", &env.temp_dir.path().join("nope").to_string_lossy())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageIo);

    client.unmount("/ext").await.unwrap();
    assert_eq!(client.get_file_id("/ext/a").await.unwrap(), None);
    client.mount("/ext", &env.external_address()).await.unwrap();

    server.stop().await;
}

#[tokio::test]
async fn test_worker_commands_and_lost_files() {
    let env = TestEnv::new();
    let server = TestServer::start(env.master()).await;
    let client = &server.client;

    let worker = client.register_worker("worker-1:29998").await.unwrap();
    assert_eq!(client.register_worker("worker-1:29998").await.unwrap(), worker);

    let id = client
        .create("/cached", TEST_BLOCK_SIZE, false, Some(Duration::from_secs(3600)))
        .await
        .unwrap();
    assert_eq!(client.get_file_info(id).await.unwrap().ttl_ms, Some(3_600_000));

    let block_id = client.get_new_block_id_for_file(id).await.unwrap();
    client.commit_block(worker, block_id, 8).await.unwrap();
    client.complete_file(id).await.unwrap();

    client.report_lost_file(id).await.unwrap();
    assert_eq!(client.get_lost_files().await.unwrap(), vec![id]);
    client.commit_block(worker, block_id, 8).await.unwrap();
    assert!(client.get_lost_files().await.unwrap().is_empty());

    assert_eq!(client.free(id, false).await.unwrap(), Outcome::Applied);
    assert_eq!(
        client.worker_heartbeat(worker).await.unwrap(),
        vec![WorkerCommand::Free {
            block_ids: vec![block_id]
        }]
    );
    assert!(client.worker_heartbeat(worker).await.unwrap().is_empty());

    let err = client.worker_heartbeat(worker + 100).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    server.stop().await;
}
