//! Integration tests for the worker role against a live master.

#[allow(dead_code)]
mod common;

use common::{TestEnv, TestServer, TestWorker, TEST_BLOCK_SIZE};
use memspace::master::WorkerCommand;
use memspace::session::{SessionCleaner, SessionId};
use memspace::shutdown::ShutdownCoordinator;
use memspace::types::Outcome;
use memspace::worker::MasterSync;
use std::time::Duration;

#[tokio::test]
async fn test_sessions_over_http() {
    let env = TestEnv::new();
    let server = TestServer::start(env.master()).await;
    let worker = TestWorker::start(server.client.clone(), Duration::from_secs(10)).await;
    let client = &worker.client;

    assert!(client.health().await.unwrap());
    assert!(client.session_heartbeat(SessionId::new(7)).await.unwrap());
    assert!(!client.session_heartbeat(SessionId::new(7)).await.unwrap());
    assert!(client.session_heartbeat(SessionId::new(-1)).await.unwrap());

    assert_eq!(
        client.list_sessions().await.unwrap(),
        vec![SessionId::new(-1), SessionId::new(7)]
    );
    assert_eq!(client.status().await.unwrap().sessions, 2);

    assert!(client.remove_session(SessionId::new(7)).await.unwrap());
    assert!(!client.remove_session(SessionId::new(7)).await.unwrap());
    assert!(!worker.worker.sessions().contains(SessionId::new(7)));

    worker.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn test_sync_registers_and_refreshes_pins() {
    let env = TestEnv::new();
    let server = TestServer::start(env.master()).await;
    let worker = TestWorker::start(server.client.clone(), Duration::from_secs(10)).await;

    let f = server.client.create("/hot", 512, false, None).await.unwrap();
    server.client.set_pinned(f, true).await.unwrap();

    assert!(worker.worker.sync_with_master().await.unwrap().is_empty());
    let id = worker.worker.worker_id().unwrap();
    assert_eq!(
        server.client.register_worker(worker.worker.address()).await.unwrap(),
        id
    );
    assert!(worker.worker.is_pinned(f));

    let status = worker.client.status().await.unwrap();
    assert_eq!(status.worker_id, Some(id));
    assert_eq!(status.pinned, vec![f]);

    server.client.set_pinned(f, false).await.unwrap();
    worker.worker.sync_with_master().await.unwrap();
    assert!(worker.worker.pinned_files().is_empty());
    assert_eq!(worker.worker.worker_id(), Some(id));

    worker.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn test_sync_delivers_master_commands() {
    let env = TestEnv::new();
    let server = TestServer::start(env.master()).await;
    let worker = TestWorker::start(server.client.clone(), Duration::from_secs(10)).await;
    let master = &server.client;

    let id = worker.worker.register().await.unwrap();
    let f = master.create("/cached", TEST_BLOCK_SIZE, false, None).await.unwrap();
    let block_id = master.get_new_block_id_for_file(f).await.unwrap();
    master.commit_block(id, block_id, 8).await.unwrap();
    master.complete_file(f).await.unwrap();

    assert_eq!(master.free(f, false).await.unwrap(), Outcome::Applied);
    assert_eq!(
        worker.worker.sync_with_master().await.unwrap(),
        vec![WorkerCommand::Free {
            block_ids: vec![block_id]
        }]
    );
    assert!(worker.worker.sync_with_master().await.unwrap().is_empty());

    worker.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn test_cleaner_reclaims_sessions_heartbeated_over_http() {
    let env = TestEnv::new();
    let server = TestServer::start(env.master()).await;
    let worker = TestWorker::start(server.client.clone(), Duration::from_millis(200)).await;
    let abandoned = SessionId::new(1);
    let alive = SessionId::new(2);

    worker.client.session_heartbeat(abandoned).await.unwrap();
    worker.client.session_heartbeat(alive).await.unwrap();

    let coordinator = ShutdownCoordinator::new();
    let cleaner = SessionCleaner::new(worker.worker.sessions().clone(), Duration::from_millis(10));
    let task = tokio::spawn(cleaner.run(coordinator.subscribe()));

    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        worker.client.session_heartbeat(alive).await.unwrap();
    }

    coordinator.shutdown();
    task.await.unwrap();

    assert_eq!(worker.client.list_sessions().await.unwrap(), vec![alive]);

    worker.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn test_master_sync_loop_registers_worker() {
    let env = TestEnv::new();
    let server = TestServer::start(env.master()).await;
    let worker = TestWorker::start(server.client.clone(), Duration::from_secs(10)).await;

    let sync = MasterSync::new(worker.worker.clone(), Duration::from_millis(20));
    let task = tokio::spawn(sync.run(worker.coordinator.subscribe()));

    let mut registered = None;
    for _ in 0..100 {
        registered = worker.worker.worker_id();
        if registered.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(registered.is_some());

    worker.stop().await;
    task.await.unwrap();
    server.stop().await;
}
