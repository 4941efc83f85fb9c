//! Integration tests for the worker session registry and cleaner.

use memspace::config::WorkerConfig;
use memspace::session::{ReservedSession, SessionCleaner, SessionId, SessionRegistry};
use memspace::shutdown::ShutdownCoordinator;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn test_concurrent_heartbeats_create_one_session_per_id() {
    let registry = Arc::new(SessionRegistry::new(Duration::from_secs(10)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                let mut created = 0;
                for id in 1..=50 {
                    if registry.heartbeat(SessionId::new(id)) {
                        created += 1;
                    }
                }
                created
            })
        })
        .collect();

    let created: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(created, 50);
    assert_eq!(registry.len(), 50);
}

#[test]
fn test_last_heartbeat_is_latest_call() {
    let registry = SessionRegistry::new(Duration::from_secs(10));
    let id = SessionId::new(7);
    let start = Instant::now();

    registry.heartbeat_at(id, start);
    registry.heartbeat_at(id, start + Duration::from_secs(3));
    registry.heartbeat_at(id, start + Duration::from_secs(1));

    let info = registry.get(id).unwrap();
    assert_eq!(info.last_heartbeat(), start + Duration::from_secs(3));
}

#[test]
fn test_list_timed_out() {
    let registry = SessionRegistry::new(Duration::from_secs(5));
    let start = Instant::now();
    let stale = SessionId::new(1);
    let fresh = SessionId::new(2);

    registry.heartbeat_at(stale, start);
    registry.heartbeat_at(fresh, start + Duration::from_secs(4));

    let now = start + Duration::from_secs(6);
    assert_eq!(registry.list_timed_out_at(now), vec![stale]);

    // Exactly at the timeout is not yet timed out.
    assert!(registry
        .list_timed_out_at(start + Duration::from_secs(5))
        .is_empty());

    assert!(registry.list_timed_out_at(start).is_empty());
}

#[test]
fn test_remove_is_idempotent() {
    let registry = SessionRegistry::new(Duration::from_secs(5));
    let id = SessionId::new(3);
    registry.heartbeat(id);

    assert!(registry.remove(id));
    assert!(!registry.remove(id));
    assert!(!registry.remove(SessionId::new(99)));
    assert!(registry.is_empty());

    // A later heartbeat starts a fresh session.
    assert!(registry.heartbeat(id));
}

#[test]
fn test_reserved_sessions_are_tracked_like_any_other() {
    let registry = SessionRegistry::new(Duration::from_secs(5));
    for reserved in ReservedSession::ALL {
        registry.heartbeat(reserved.into());
    }
    registry.heartbeat(SessionId::new(42));

    let ids = registry.session_ids();
    assert_eq!(ids.len(), 6);
    assert_eq!(ids[0], ReservedSession::AccessBlock.session_id());
    assert_eq!(ids[0].reserved(), Some(ReservedSession::AccessBlock));
    assert!(!ids[5].is_reserved());
}

#[test]
fn test_registry_from_config() {
    let config = WorkerConfig {
        session_timeout: Duration::from_millis(1500),
        session_check_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let registry = SessionRegistry::from_config(&config);
    assert_eq!(registry.default_timeout(), Duration::from_millis(1500));
}

#[tokio::test]
async fn test_cleaner_reclaims_abandoned_sessions() {
    let registry = Arc::new(SessionRegistry::new(Duration::from_millis(200)));
    let abandoned = SessionId::new(1);
    let alive = SessionId::new(2);
    registry.heartbeat(abandoned);
    registry.heartbeat(alive);

    let cleaned = Arc::new(Mutex::new(Vec::new()));
    let hook_cleaned = cleaned.clone();
    let cleaner = SessionCleaner::new(registry.clone(), Duration::from_millis(10))
        .on_cleanup(move |id| hook_cleaned.lock().push(id));

    let coordinator = ShutdownCoordinator::new();
    let task = tokio::spawn(cleaner.run(coordinator.subscribe()));

    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.heartbeat(alive);
    }

    coordinator.shutdown();
    task.await.unwrap();

    assert_eq!(*cleaned.lock(), vec![abandoned]);
    assert!(!registry.contains(abandoned));
    assert!(registry.contains(alive));
}
