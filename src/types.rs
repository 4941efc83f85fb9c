//! Core type definitions for memspace.
//!
//! This module contains the identifiers and snapshot types that cross the
//! boundary between the namespace master and its callers.
//!
//! # Key Types
//!
//! - [`BlockId`]: block identifier derived from the owning file's id
//! - [`FileInfo`]: immutable snapshot of one inode's metadata
//! - [`FileBlockInfo`]: one block of a file with its current locations
//! - [`Outcome`]: result of an operation that may be refused by policy
//!
//! # Type Aliases
//!
//! - [`FileId`] = `u64`: inode identifier
//! - [`WorkerId`] = `u64`: worker identifier
//!
//! # Examples
//!
//! ```rust
//! use memspace::types::BlockId;
//!
//! let block = BlockId::new(7, 2);
//! assert_eq!(block.container_id(), 7);
//! assert_eq!(block.sequence(), 2);
//! ```

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for an inode.
pub type FileId = u64;

/// Unique identifier for a worker.
pub type WorkerId = u64;

/// Inode id of the root directory.
pub const ROOT_ID: FileId = 1;

/// Number of low bits of a block id holding the sequence number.
const SEQUENCE_BITS: u32 = 24;

/// Block identifier: `(container_id << 24) | sequence`.
///
/// The container id is the id of the file owning the block and the sequence
/// is the block's position in that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u64);

impl BlockId {
    /// Largest value the sequence field can encode.
    pub const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

    /// Blocks one file may hold; sequences run `0..MAX_BLOCKS_PER_FILE`.
    pub const MAX_BLOCKS_PER_FILE: u64 = Self::MAX_SEQUENCE;

    /// Largest container id whose bits survive the shift.
    pub const MAX_CONTAINER_ID: u64 = u64::MAX >> SEQUENCE_BITS;

    /// Build a block id from parts already known to be in range.
    ///
    /// Use [`BlockId::try_new`] when the container id is not bounded by
    /// [`BlockId::MAX_CONTAINER_ID`].
    pub fn new(container_id: u64, sequence: u64) -> Self {
        debug_assert!(container_id <= Self::MAX_CONTAINER_ID);
        Self((container_id << SEQUENCE_BITS) | (sequence & Self::MAX_SEQUENCE))
    }

    /// Build a block id, or `None` if either part does not fit its field.
    pub fn try_new(container_id: u64, sequence: u64) -> Option<Self> {
        if container_id > Self::MAX_CONTAINER_ID || sequence > Self::MAX_SEQUENCE {
            return None;
        }
        Some(Self((container_id << SEQUENCE_BITS) | sequence))
    }

    pub fn container_id(&self) -> u64 {
        self.0 >> SEQUENCE_BITS
    }

    pub fn sequence(&self) -> u64 {
        self.0 & Self::MAX_SEQUENCE
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of an inode's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_id: FileId,
    pub name: String,
    pub path: String,
    /// Location in the under file system, resolved through the mount table.
    pub ufs_path: String,
    pub length: u64,
    pub block_size_bytes: u64,
    pub creation_time_ms: u64,
    pub last_modification_time_ms: u64,
    pub is_directory: bool,
    pub is_completed: bool,
    pub is_persisted: bool,
    pub is_pinned: bool,
    pub ttl_ms: Option<u64>,
    pub block_ids: Vec<BlockId>,
    /// Share of blocks cached by at least one worker, 0-100.
    pub in_memory_percentage: u32,
}

/// A worker holding a copy of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLocation {
    pub worker_id: WorkerId,
    pub address: String,
}

/// A block and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub block_id: BlockId,
    pub length: u64,
    pub locations: Vec<BlockLocation>,
}

/// A block in the context of its file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlockInfo {
    pub block_info: BlockInfo,
    /// Byte offset of the block in the file.
    pub offset: u64,
    /// Under storage copies, present once the file is persisted.
    pub ufs_locations: Vec<String>,
}

/// Why an operation declined to act.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "path", rename_all = "snake_case")]
pub enum Refusal {
    /// The root directory cannot be deleted or moved.
    RootDirectory,
    /// The target is a mount point, or contains one.
    MountPoint(String),
    /// Source and destination live under different mount points.
    CrossMount(String),
    /// A file in scope is pinned.
    Pinned(String),
}

impl std::fmt::Display for Refusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Refusal::RootDirectory => write!(f, "root directory"),
            Refusal::MountPoint(p) => write!(f, "mount point {}", p),
            Refusal::CrossMount(p) => write!(f, "crosses mount point {}", p),
            Refusal::Pinned(p) => write!(f, "pinned file {}", p),
        }
    }
}

/// Result of an operation that policy may refuse without it being an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Applied,
    Refused(Refusal),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    pub fn refusal(&self) -> Option<&Refusal> {
        match self {
            Outcome::Refused(r) => Some(r),
            Outcome::Applied => None,
        }
    }
}

/// Milliseconds since the Unix epoch, saturating at zero.
pub fn millis_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_layout() {
        let id = BlockId::new(3, 0);
        assert_eq!(id.0, 3 << 24);
        assert_eq!(BlockId::new(3, 1).0, id.0 + 1);
        assert_eq!(BlockId::new(3, BlockId::MAX_SEQUENCE).container_id(), 3);
    }

    #[test]
    fn test_try_new_rejects_out_of_range_parts() {
        let last = BlockId::try_new(BlockId::MAX_CONTAINER_ID, BlockId::MAX_SEQUENCE).unwrap();
        assert_eq!(last.0, u64::MAX);
        assert_eq!(last.container_id(), BlockId::MAX_CONTAINER_ID);

        assert!(BlockId::try_new(BlockId::MAX_CONTAINER_ID + 1, 0).is_none());
        assert!(BlockId::try_new(1 << 40, 0).is_none());
        assert!(BlockId::try_new(3, BlockId::MAX_SEQUENCE + 1).is_none());
    }

    #[test]
    fn test_block_ids_order_by_sequence() {
        let a = BlockId::new(9, 4);
        let b = BlockId::new(9, 5);
        assert!(a < b);
    }

    #[test]
    fn test_outcome() {
        assert!(Outcome::Applied.is_applied());
        let refused = Outcome::Refused(Refusal::RootDirectory);
        assert!(!refused.is_applied());
        assert_eq!(refused.refusal(), Some(&Refusal::RootDirectory));
    }

    #[test]
    fn test_refusal_wire_shape() {
        let json = serde_json::to_value(Refusal::Pinned("/a".into())).unwrap();
        assert_eq!(json["reason"], "pinned");
        assert_eq!(json["path"], "/a");
    }
}
