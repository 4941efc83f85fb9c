//! Worker-facing block bookkeeping.
//!
//! The namespace master decides which blocks a file has; the block master
//! knows which of them workers have actually committed, how long they are,
//! and where copies live. It also queues the free/delete commands that
//! workers pick up on their next heartbeat.

use crate::error::{MemspaceError, Result};
use crate::types::{BlockId, BlockInfo, BlockLocation, WorkerId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Work a worker must do on its local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WorkerCommand {
    /// Drop cached copies; the blocks stay known to the master.
    Free { block_ids: Vec<BlockId> },
    /// The blocks no longer belong to any file.
    Delete { block_ids: Vec<BlockId> },
}

#[derive(Debug)]
struct WorkerEntry {
    address: String,
    pending: Vec<WorkerCommand>,
}

#[derive(Debug)]
struct BlockMeta {
    length: u64,
    locations: BTreeSet<WorkerId>,
}

#[derive(Debug, Default)]
struct BlockState {
    next_worker_id: WorkerId,
    workers: HashMap<WorkerId, WorkerEntry>,
    blocks: HashMap<BlockId, BlockMeta>,
    lost: BTreeSet<BlockId>,
}

impl BlockState {
    /// Queue `command_for(block_ids)` on each worker holding any of them.
    fn queue<F>(&mut self, holders: BTreeMap<WorkerId, Vec<BlockId>>, command_for: F)
    where
        F: Fn(Vec<BlockId>) -> WorkerCommand,
    {
        for (worker_id, block_ids) in holders {
            if let Some(worker) = self.workers.get_mut(&worker_id) {
                worker.pending.push(command_for(block_ids));
            }
        }
    }
}

#[derive(Debug)]
pub struct BlockMaster {
    state: Mutex<BlockState>,
}

impl Default for BlockMaster {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockMaster {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BlockState {
                next_worker_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Register a worker, reusing the id of a worker already known at `address`.
    pub fn register_worker(&self, address: &str) -> WorkerId {
        let mut state = self.state.lock();
        if let Some((&id, _)) = state
            .workers
            .iter()
            .find(|(_, w)| w.address == address)
        {
            return id;
        }

        let id = state.next_worker_id;
        state.next_worker_id += 1;
        state.workers.insert(
            id,
            WorkerEntry {
                address: address.to_string(),
                pending: Vec::new(),
            },
        );
        info!(worker_id = id, address, "Worker registered");
        id
    }

    pub fn worker_count(&self) -> usize {
        self.state.lock().workers.len()
    }

    /// Record that `worker_id` holds `block_id` with `length` bytes.
    pub fn commit_block(&self, worker_id: WorkerId, block_id: BlockId, length: u64) -> Result<()> {
        let mut state = self.state.lock();
        if !state.workers.contains_key(&worker_id) {
            return Err(MemspaceError::InvalidState(format!(
                "commit_block: unknown worker {}",
                worker_id
            )));
        }

        let meta = state.blocks.entry(block_id).or_insert_with(|| BlockMeta {
            length,
            locations: BTreeSet::new(),
        });
        meta.length = length;
        meta.locations.insert(worker_id);
        if state.lost.remove(&block_id) {
            info!(block = %block_id, worker_id, "Lost block recovered");
        }

        debug!(block = %block_id, worker_id, length, "Block committed");
        Ok(())
    }

    /// Drain the commands queued for a worker.
    pub fn worker_heartbeat(&self, worker_id: WorkerId) -> Result<Vec<WorkerCommand>> {
        let mut state = self.state.lock();
        let worker = state.workers.get_mut(&worker_id).ok_or_else(|| {
            MemspaceError::InvalidState(format!("worker_heartbeat: unknown worker {}", worker_id))
        })?;
        Ok(std::mem::take(&mut worker.pending))
    }

    /// Length of a committed block.
    pub fn block_length(&self, block_id: BlockId) -> Option<u64> {
        self.state.lock().blocks.get(&block_id).map(|m| m.length)
    }

    /// Length and current locations of a committed block.
    pub fn block_info(&self, block_id: BlockId) -> Option<BlockInfo> {
        let state = self.state.lock();
        let meta = state.blocks.get(&block_id)?;
        let locations = meta
            .locations
            .iter()
            .filter_map(|worker_id| {
                state.workers.get(worker_id).map(|w| BlockLocation {
                    worker_id: *worker_id,
                    address: w.address.clone(),
                })
            })
            .collect();
        Some(BlockInfo {
            block_id,
            length: meta.length,
            locations,
        })
    }

    /// How many of `block_ids` are held by at least one worker.
    pub fn cached_count(&self, block_ids: &[BlockId]) -> usize {
        let state = self.state.lock();
        block_ids
            .iter()
            .filter(|id| {
                state
                    .blocks
                    .get(id)
                    .map(|m| !m.locations.is_empty())
                    .unwrap_or(false)
            })
            .count()
    }

    /// Ask every holder to drop its cached copy of `block_ids`.
    pub fn free_blocks(&self, block_ids: &[BlockId]) {
        let mut state = self.state.lock();
        let mut holders: BTreeMap<WorkerId, Vec<BlockId>> = BTreeMap::new();
        for block_id in block_ids {
            if let Some(meta) = state.blocks.get_mut(block_id) {
                for worker_id in std::mem::take(&mut meta.locations) {
                    holders.entry(worker_id).or_default().push(*block_id);
                }
            }
        }
        debug!(blocks = block_ids.len(), workers = holders.len(), "Freeing blocks");
        state.queue(holders, |block_ids| WorkerCommand::Free { block_ids });
    }

    /// Forget `block_ids` and tell their holders to delete them.
    pub fn remove_blocks(&self, block_ids: &[BlockId]) {
        let mut state = self.state.lock();
        let mut holders: BTreeMap<WorkerId, Vec<BlockId>> = BTreeMap::new();
        for block_id in block_ids {
            state.lost.remove(block_id);
            if let Some(meta) = state.blocks.remove(block_id) {
                for worker_id in meta.locations {
                    holders.entry(worker_id).or_default().push(*block_id);
                }
            }
        }
        state.queue(holders, |block_ids| WorkerCommand::Delete { block_ids });
    }

    /// Mark blocks lost and drop their locations.
    pub fn report_lost(&self, block_ids: &[BlockId]) {
        let mut state = self.state.lock();
        for block_id in block_ids {
            if let Some(meta) = state.blocks.get_mut(block_id) {
                meta.locations.clear();
            }
            state.lost.insert(*block_id);
        }
        warn!(blocks = block_ids.len(), "Blocks reported lost");
    }

    pub fn is_lost(&self, block_id: BlockId) -> bool {
        self.state.lock().lost.contains(&block_id)
    }

    pub fn lost_blocks(&self) -> BTreeSet<BlockId> {
        self.state.lock().lost.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_register_reuses_address() {
        let blocks = BlockMaster::new();
        let a = blocks.register_worker("w1:29998");
        let b = blocks.register_worker("w2:29998");
        assert_ne!(a, b);
        assert_eq!(blocks.register_worker("w1:29998"), a);
        assert_eq!(blocks.worker_count(), 2);
    }

    #[test]
    fn test_commit_requires_known_worker() {
        let blocks = BlockMaster::new();
        let err = blocks.commit_block(42, BlockId::new(2, 0), 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(blocks.block_info(BlockId::new(2, 0)).is_none());
    }

    #[test]
    fn test_free_queues_command_and_keeps_length() {
        let blocks = BlockMaster::new();
        let worker = blocks.register_worker("w1:29998");
        let block = BlockId::new(2, 0);
        blocks.commit_block(worker, block, 10).unwrap();
        assert_eq!(blocks.cached_count(&[block]), 1);

        blocks.free_blocks(&[block]);

        assert_eq!(blocks.cached_count(&[block]), 0);
        assert_eq!(blocks.block_length(block), Some(10));
        assert_eq!(
            blocks.worker_heartbeat(worker).unwrap(),
            vec![WorkerCommand::Free {
                block_ids: vec![block]
            }]
        );
        assert!(blocks.worker_heartbeat(worker).unwrap().is_empty());
    }

    #[test]
    fn test_lost_cleared_by_recommit() {
        let blocks = BlockMaster::new();
        let worker = blocks.register_worker("w1:29998");
        let block = BlockId::new(3, 1);
        blocks.commit_block(worker, block, 5).unwrap();

        blocks.report_lost(&[block]);
        assert!(blocks.is_lost(block));
        assert!(blocks.block_info(block).unwrap().locations.is_empty());

        blocks.commit_block(worker, block, 5).unwrap();
        assert!(!blocks.is_lost(block));
        assert_eq!(blocks.block_info(block).unwrap().locations[0].address, "w1:29998");
    }

    #[test]
    fn test_remove_blocks_queues_delete() {
        let blocks = BlockMaster::new();
        let worker = blocks.register_worker("w1:29998");
        let block = BlockId::new(4, 0);
        blocks.commit_block(worker, block, 1).unwrap();

        blocks.remove_blocks(&[block]);

        assert!(blocks.block_length(block).is_none());
        let commands = blocks.worker_heartbeat(worker).unwrap();
        assert_eq!(
            commands,
            vec![WorkerCommand::Delete {
                block_ids: vec![block]
            }]
        );
    }
}
