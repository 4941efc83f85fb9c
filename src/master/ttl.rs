//! Time-to-live tracking for files.

use super::FileSystemMaster;
use crate::observability::{record_ttl_expired, update_namespace_metrics};
use crate::types::FileId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Files with a TTL, ordered by expiry time (milliseconds since the epoch).
#[derive(Debug, Default)]
pub struct TtlIndex {
    by_expiry: BTreeMap<u64, BTreeSet<FileId>>,
    by_file: HashMap<FileId, u64>,
}

impl TtlIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: FileId, expiry_ms: u64) {
        self.remove(id);
        self.by_expiry.entry(expiry_ms).or_default().insert(id);
        self.by_file.insert(id, expiry_ms);
    }

    pub fn remove(&mut self, id: FileId) -> bool {
        let expiry = match self.by_file.remove(&id) {
            Some(expiry) => expiry,
            None => return false,
        };
        if let Some(ids) = self.by_expiry.get_mut(&expiry) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_expiry.remove(&expiry);
            }
        }
        true
    }

    /// Files whose expiry is at or before `now_ms`, earliest first.
    pub fn expired(&self, now_ms: u64) -> Vec<FileId> {
        self.by_expiry
            .range(..=now_ms)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }
}

/// Background task deleting files whose TTL has elapsed.
pub struct TtlChecker {
    master: Arc<FileSystemMaster>,
    check_interval: Duration,
}

impl TtlChecker {
    pub fn new(master: Arc<FileSystemMaster>, check_interval: Duration) -> Self {
        Self {
            master,
            check_interval,
        }
    }

    /// Run the checker as a background task.
    pub async fn run(self, mut shutdown_rx: tokio::sync::broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.check_interval);

        info!("TTL checker starting");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let expired = self.master.expire_ttl_files(SystemTime::now());
                    if !expired.is_empty() {
                        info!(count = expired.len(), "Deleted expired files");
                        record_ttl_expired(expired.len());
                    }
                    update_namespace_metrics(self.master.inode_count());
                    debug!("TTL check completed");
                }
                _ = shutdown_rx.recv() => {
                    info!("TTL checker shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_is_inclusive_and_ordered() {
        let mut index = TtlIndex::new();
        index.insert(5, 200);
        index.insert(3, 100);
        index.insert(4, 100);
        index.insert(6, 300);

        assert_eq!(index.expired(99), Vec::<FileId>::new());
        assert_eq!(index.expired(200), vec![3, 4, 5]);
    }

    #[test]
    fn test_reinsert_and_remove() {
        let mut index = TtlIndex::new();
        index.insert(1, 100);
        index.insert(1, 500);

        assert!(index.expired(100).is_empty());
        assert_eq!(index.len(), 1);

        assert!(index.remove(1));
        assert!(!index.remove(1));
        assert!(index.is_empty());
    }
}
